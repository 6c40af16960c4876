use async_trait::async_trait;
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::{HealthProbe, HealthStatus};
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

use super::KafkaConnection;

// ============================================================================
// Broker Publisher
// ============================================================================
//
// One publisher is bound to one exchange topic. The destination passed to
// `publish` is the routing key inside that topic: it becomes the record key
// and the `routing-key` header.
//
// Publishing is fire-and-forget. `publish` returns once the producer has
// queued the record; the delivery report is awaited on a background task
// that logs failures and feeds the circuit breaker. The breaker only admits
// the publish, a queued record is neither a success nor a failure.
//
// ============================================================================

pub const ROUTING_KEY_HEADER: &str = "routing-key";
pub const CONTENT_TYPE_HEADER: &str = "content-type";
pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Publisher circuit '{0}' is open")]
    CircuitOpen(String),

    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Flush task failed: {0}")]
    Flush(String),
}

impl From<CircuitBreakerError> for PublishError {
    fn from(err: CircuitBreakerError) -> Self {
        match err {
            CircuitBreakerError::CircuitOpen(name) => PublishError::CircuitOpen(name),
        }
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), PublishError>;

    /// Flushes records still queued in the client.
    async fn close(&self) -> Result<(), PublishError>;
}

pub struct KafkaPublisher {
    producer: FutureProducer,
    exchange: String,
    flush_timeout: Duration,
    circuit_breaker: CircuitBreaker,
}

impl KafkaPublisher {
    pub fn new(
        connection: &KafkaConnection,
        exchange: &str,
        publish_timeout: Duration,
    ) -> Result<Self, PublishError> {
        let producer: FutureProducer = connection.producer_config(publish_timeout).create()?;

        tracing::info!(
            brokers = %connection.brokers(),
            exchange = %exchange,
            "Kafka publisher created"
        );

        Ok(Self {
            producer,
            exchange: exchange.to_string(),
            flush_timeout: publish_timeout,
            circuit_breaker: CircuitBreaker::new(
                format!("publisher:{}", exchange),
                CircuitBreakerConfig::default(),
            ),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.circuit_breaker = self.circuit_breaker.with_metrics(metrics);
        self
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }

    fn enqueue(&self, destination: &str, payload: &[u8]) -> Result<(), KafkaError> {
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: ROUTING_KEY_HEADER,
                value: Some(destination),
            })
            .insert(Header {
                key: CONTENT_TYPE_HEADER,
                value: Some(JSON_CONTENT_TYPE),
            });

        let record = FutureRecord::to(&self.exchange)
            .key(destination)
            .payload(payload)
            .headers(headers);

        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(e, _)| e)?;

        let exchange = self.exchange.clone();
        let destination = destination.to_string();
        let breaker = self.circuit_breaker.clone();

        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok(_)) => {
                    tracing::debug!(
                        exchange = %exchange,
                        destination = %destination,
                        "Delivered to broker"
                    );
                    breaker.record_success().await;
                }
                Ok(Err((e, _))) => {
                    tracing::error!(
                        error = %e,
                        exchange = %exchange,
                        destination = %destination,
                        "Broker rejected record"
                    );
                    breaker.record_failure().await;
                }
                Err(_) => {
                    tracing::warn!(
                        exchange = %exchange,
                        destination = %destination,
                        "Delivery report dropped before completion"
                    );
                }
            }
        });

        Ok(())
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), PublishError> {
        if let Err(e) = self.circuit_breaker.check().await {
            tracing::warn!(
                error = %e,
                exchange = %self.exchange,
                destination = %destination,
                "Publish rejected"
            );
            return Err(e.into());
        }

        // Only delivery reports count as successes.
        if let Err(e) = self.enqueue(destination, payload) {
            self.circuit_breaker.record_failure().await;
            tracing::error!(
                error = %e,
                exchange = %self.exchange,
                destination = %destination,
                "Failed to publish"
            );
            return Err(e.into());
        }

        tracing::debug!(
            exchange = %self.exchange,
            destination = %destination,
            "Queued record for publish"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), PublishError> {
        tracing::info!(exchange = %self.exchange, "Flushing publisher");
        let producer = self.producer.clone();
        let timeout = self.flush_timeout;

        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| PublishError::Flush(e.to_string()))??;
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for KafkaPublisher {
    fn component_name(&self) -> &str {
        "publisher"
    }

    async fn check_health(&self) -> HealthStatus {
        circuit_health(self.circuit_state().await)
    }
}

pub(crate) fn circuit_health(state: CircuitState) -> HealthStatus {
    match state {
        CircuitState::Closed => HealthStatus::Healthy,
        CircuitState::HalfOpen => HealthStatus::Degraded("Circuit breaker half-open".to_string()),
        CircuitState::Open => HealthStatus::Unhealthy("Circuit breaker open".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_state_maps_to_health() {
        assert_eq!(circuit_health(CircuitState::Closed), HealthStatus::Healthy);
        assert!(matches!(circuit_health(CircuitState::HalfOpen), HealthStatus::Degraded(_)));
        assert!(circuit_health(CircuitState::Open).is_unhealthy());
    }

    #[test]
    fn test_open_circuit_maps_to_publish_error() {
        let err: PublishError =
            CircuitBreakerError::CircuitOpen("publisher:order-events".into()).into();
        assert!(matches!(err, PublishError::CircuitOpen(ref name) if name == "publisher:order-events"));
    }

    #[tokio::test]
    async fn test_publish_queues_without_reachable_broker() {
        // librdkafka accepts records into its local queue before any broker
        // connection exists, so fire-and-forget publish succeeds here.
        let connection = KafkaConnection::new("127.0.0.1:1");
        let publisher = KafkaPublisher::new(&connection, "order-events", Duration::from_millis(100)).unwrap();

        publisher
            .publish("order.ready", br#"{"orderId":"42","status":"READY"}"#)
            .await
            .unwrap();
        assert_eq!(publisher.circuit_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failed_deliveries_open_circuit_despite_queued_publishes() {
        let connection = KafkaConnection::new("127.0.0.1:1");
        let publisher = KafkaPublisher::new(&connection, "order-events", Duration::from_millis(100)).unwrap();
        let threshold = CircuitBreakerConfig::default().failure_threshold;

        for _ in 0..threshold {
            publisher
                .publish("order.ready", br#"{"orderId":"42","status":"READY"}"#)
                .await
                .unwrap();
        }
        // Queued records alone never move the breaker.
        assert_eq!(publisher.circuit_state().await, CircuitState::Closed);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
        while publisher.circuit_state().await != CircuitState::Open {
            assert!(tokio::time::Instant::now() < deadline, "delivery reports never opened the circuit");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let err = publisher
            .publish("order.ready", br#"{"orderId":"42","status":"READY"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::CircuitOpen(_)));
    }

    #[tokio::test]
    async fn test_close_flushes_idle_publisher() {
        let connection = KafkaConnection::new("127.0.0.1:1");
        let publisher = KafkaPublisher::new(&connection, "order-events", Duration::from_millis(100)).unwrap();

        publisher.close().await.unwrap();
    }
}
