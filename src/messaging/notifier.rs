use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::order::{OrderId, OrderStatus, OrderStatusEvent};
use crate::metrics::Metrics;

use super::publisher::{PublishError, Publisher};

// ============================================================================
// Order Notifier
// ============================================================================
//
// Announces `{"orderId": .., "status": ..}` to one fixed destination.
// Never retries: a failure goes back to the caller, and the consumer's
// requeue is what delivers the notification again.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to serialize notification for order {order_id} ({status}): {source}")]
    Serialize {
        order_id: OrderId,
        status: OrderStatus,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to publish notification for order {order_id} ({status}): {source}")]
    Publish {
        order_id: OrderId,
        status: OrderStatus,
        #[source]
        source: PublishError,
    },
}

#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn notify_order(&self, order_id: &OrderId, status: OrderStatus) -> Result<(), NotifyError>;
}

pub struct BrokerOrderNotifier {
    publisher: Arc<dyn Publisher>,
    destination: String,
    metrics: Option<Arc<Metrics>>,
}

impl BrokerOrderNotifier {
    pub fn new(publisher: Arc<dyn Publisher>, destination: &str) -> Self {
        Self {
            publisher,
            destination: destination.to_string(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record(&self, status: OrderStatus, success: bool) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_notification(status.as_str(), success);
        }
    }
}

#[async_trait]
impl OrderNotifier for BrokerOrderNotifier {
    async fn notify_order(&self, order_id: &OrderId, status: OrderStatus) -> Result<(), NotifyError> {
        let event = OrderStatusEvent {
            order_id: order_id.clone(),
            status,
        };

        let payload = serde_json::to_vec(&event).map_err(|source| {
            self.record(status, false);
            NotifyError::Serialize {
                order_id: order_id.clone(),
                status,
                source,
            }
        })?;

        if let Err(source) = self.publisher.publish(&self.destination, &payload).await {
            self.record(status, false);
            return Err(NotifyError::Publish {
                order_id: order_id.clone(),
                status,
                source,
            });
        }

        self.record(status, true);
        tracing::info!(
            order_id = %order_id,
            status = %status,
            destination = %self.destination,
            "📤 Order notification published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::in_memory::InMemoryPublisher;
    use serde_json::json;

    #[tokio::test]
    async fn test_notify_publishes_status_payload_to_destination() {
        let publisher = InMemoryPublisher::new();
        let notifier = BrokerOrderNotifier::new(Arc::new(publisher.clone()), "order.ready");

        notifier
            .notify_order(&OrderId::from("42"), OrderStatus::Ready)
            .await
            .unwrap();

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].destination, "order.ready");
        assert_eq!(published[0].payload, json!({"orderId": "42", "status": "READY"}));
    }

    #[tokio::test]
    async fn test_publish_failure_carries_order_context() {
        let publisher = InMemoryPublisher::new();
        publisher.fail(true);
        let metrics = Arc::new(Metrics::new().unwrap());
        let notifier = BrokerOrderNotifier::new(Arc::new(publisher), "order.ready")
            .with_metrics(metrics.clone());

        let err = notifier
            .notify_order(&OrderId::from("7"), OrderStatus::Created)
            .await
            .unwrap_err();

        match &err {
            NotifyError::Publish { order_id, status, .. } => {
                assert_eq!(order_id.as_str(), "7");
                assert_eq!(*status, OrderStatus::Created);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("order 7 (CREATED)"));
        assert_eq!(
            metrics
                .notifications_published
                .with_label_values(&["CREATED", "failed"])
                .get(),
            1
        );
    }
}
