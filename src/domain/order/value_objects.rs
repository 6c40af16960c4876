use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::errors::OrderError;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Partition tag shared by every production order in the secondary index.
pub const ORDER_ENTITY: &str = "ORDER";

/// Opaque order identifier.
///
/// Upstream services send it either as a JSON string or as a JSON integer;
/// both normalise to the same string key and it is never parsed beyond that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Text(id) if id.trim().is_empty() => {
                Err(serde::de::Error::custom("order id must not be empty"))
            }
            RawId::Text(id) => Ok(OrderId(id)),
            RawId::Number(id) => Ok(OrderId(id.to_string())),
        }
    }
}

/// Production lifecycle. The only legal path is
/// `CREATED → PAID → PREPARING → READY → FINISHED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Paid,
    Preparing,
    Ready,
    Finished,
}

impl OrderStatus {
    /// Status assigned to every record created from a "paid" event.
    pub const INITIAL: OrderStatus = OrderStatus::Created;

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Finished => "FINISHED",
        }
    }

    pub fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Created => Some(OrderStatus::Paid),
            OrderStatus::Paid => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::Ready),
            OrderStatus::Ready => Some(OrderStatus::Finished),
            OrderStatus::Finished => None,
        }
    }

    /// Same-state transitions are accepted so a redelivered update stays a no-op.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        *self == target || self.next() == Some(target)
    }

    pub fn transition_to(&self, target: OrderStatus) -> Result<OrderStatus, OrderError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(OrderError::InvalidStatusTransition {
                from: *self,
                to: target,
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATED" => Ok(OrderStatus::Created),
            "PAID" => Ok(OrderStatus::Paid),
            "PREPARING" => Ok(OrderStatus::Preparing),
            "READY" => Ok(OrderStatus::Ready),
            "FINISHED" => Ok(OrderStatus::Finished),
            _ => Err(OrderError::UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Product {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub quantity: i32,
    #[serde(rename = "type")]
    pub item_type: String,
    pub product: Product,
}

/// A production record as owned by the repository.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
    pub entity: String,
}

impl Order {
    /// New record in the initial state, tagged for the entity index.
    /// `created_at` is cut to milliseconds, the precision of a CQL timestamp.
    pub fn new(id: OrderId, items: Vec<OrderItem>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: OrderStatus::INITIAL,
            created_at: created_at.trunc_subsecs(3),
            finished_at: None,
            items,
            entity: ORDER_ENTITY.to_string(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
