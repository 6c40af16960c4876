use serde::{Deserialize, Serialize};

use super::value_objects::{OrderId, OrderItem, OrderStatus, Product};

// ============================================================================
// Order Integration Events
// ============================================================================
//
// Wire payloads exchanged with the rest of the order pipeline.
//
// Inbound:
// - OrderProductionEvent: an order was paid and must be produced
// - OrderStatusEvent: an order moved to a new status
//
// Outbound:
// - OrderStatusEvent: announced after a successful state change
//
// ============================================================================

/// "Order paid" payload consumed from the paid-orders queue.
///
/// `status` may be present upstream but creation always starts from
/// [`OrderStatus::INITIAL`], so it is read and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderProductionEvent {
    #[serde(alias = "orderId")]
    pub id: OrderId,
    #[serde(default)]
    pub status: Option<String>,
    pub items: Vec<OrderProductionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderProductionItem {
    pub quantity: i32,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(alias = "products")]
    pub product: Product,
}

impl From<OrderProductionItem> for OrderItem {
    fn from(item: OrderProductionItem) -> Self {
        OrderItem {
            quantity: item.quantity,
            item_type: item.item_type,
            product: item.product,
        }
    }
}

/// `{"orderId": "...", "status": "..."}`, both consumed and published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusEvent {
    #[serde(alias = "id")]
    pub order_id: OrderId,
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_production_event() {
        let payload = r#"{"id":"42","status":"PAID","items":[{"quantity":2,"type":"UNIT","product":{"name":"Fries","description":"Crinkle cut"}}]}"#;
        let event: OrderProductionEvent = serde_json::from_str(payload).unwrap();

        assert_eq!(event.id.as_str(), "42");
        assert_eq!(event.status.as_deref(), Some("PAID"));
        assert_eq!(event.items.len(), 1);
        assert_eq!(event.items[0].quantity, 2);
        assert_eq!(event.items[0].product.name, "Fries");
    }

    #[test]
    fn test_decode_production_event_with_numeric_order_id() {
        let payload = r#"{"orderId":7,"items":[]}"#;
        let event: OrderProductionEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.id.as_str(), "7");
        assert!(event.items.is_empty());
    }

    #[test]
    fn test_production_event_requires_id_and_items() {
        assert!(serde_json::from_str::<OrderProductionEvent>(r#"{"items":[]}"#).is_err());
        assert!(serde_json::from_str::<OrderProductionEvent>(r#"{"id":"1"}"#).is_err());
    }

    #[test]
    fn test_status_event_wire_format() {
        let event = OrderStatusEvent {
            order_id: OrderId::from("42"),
            status: OrderStatus::Ready,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"orderId":"42","status":"READY"}"#
        );
    }

    #[test]
    fn test_status_event_accepts_id_alias() {
        let event: OrderStatusEvent =
            serde_json::from_str(r#"{"id":"42","status":"READY"}"#).unwrap();
        assert_eq!(event.order_id.as_str(), "42");
        assert_eq!(event.status, OrderStatus::Ready);
    }

    #[test]
    fn test_status_event_rejects_unknown_status() {
        assert!(serde_json::from_str::<OrderStatusEvent>(r#"{"id":"42","status":"LOST"}"#).is_err());
    }
}
