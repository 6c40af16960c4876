use async_trait::async_trait;

use crate::domain::order::{Order, OrderId, OrderStatus};

// ============================================================================
// Order Repository - Persistence Contract
// ============================================================================
//
// Each call is exactly one round trip to the backing store. Nothing is
// retried here: failures go back to the caller unchanged, and the broker
// redelivery loop is the only retry mechanism.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Order {0} not found")]
    NotFound(OrderId),

    #[error("Store failure during {operation}: {message}")]
    Store {
        operation: &'static str,
        message: String,
    },

    #[error("Order {id} changed concurrently: expected {expected}, found {actual}")]
    Conflict {
        id: OrderId,
        expected: OrderStatus,
        actual: String,
    },

    #[error("Failed to decode stored order: {0}")]
    Decode(String),
}

impl RepositoryError {
    pub fn store(operation: &'static str, err: impl std::fmt::Display) -> Self {
        RepositoryError::Store {
            operation,
            message: err.to_string(),
        }
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// All orders under the entity partition, read through the secondary index.
    async fn get_orders(&self) -> Result<Vec<Order>, RepositoryError>;

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Upsert. Last write wins.
    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Sets only the status column, provided it still holds `expected`.
    /// Fails with `NotFound` when `id` is absent and with `Conflict` when
    /// another writer changed the status first.
    async fn update_order_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        status: OrderStatus,
    ) -> Result<(), RepositoryError>;
}
