use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kameo::actor::ActorRef;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::actors::{HealthMonitorActor, HealthStatus, UpdateHealth};
use crate::metrics::Metrics;
use crate::store::{DeadLetter, DeadLetterSink};

use super::queue::{BrokerError, Delivery, DeliveryTag, MessageQueue};

// ============================================================================
// Queue Consumer - sequential receive loop with manual ack
// ============================================================================
//
// One message at a time:
//   receive → handler → ack on success / requeue on failure
//
// Delivery order equals processing order. A failing message is redelivered
// immediately until the redelivery policy moves it to the dead letter store.
//
// The loop never moves past a message it could not requeue: acking a later
// offset would commit over it. The requeue is retried, and the consumer stops
// if it keeps failing so the uncommitted offset is redelivered elsewhere.
//
// ============================================================================

const RETRY_BACKOFF: Duration = Duration::from_secs(1);
const MAX_REQUEUE_ATTEMPTS: u32 = 5;

/// Processes one raw message. An error requeues the message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()>;
}

pub enum RedeliveryPolicy {
    /// Requeue forever.
    Unbounded,
    /// Dead-letter and ack once a message has failed `max_deliveries` times.
    DeadLetterAfter {
        max_deliveries: u32,
        sink: Arc<dyn DeadLetterSink>,
    },
}

impl RedeliveryPolicy {
    /// `0` means unbounded.
    pub fn from_max_deliveries(max_deliveries: u32, sink: Arc<dyn DeadLetterSink>) -> Self {
        if max_deliveries == 0 {
            RedeliveryPolicy::Unbounded
        } else {
            RedeliveryPolicy::DeadLetterAfter { max_deliveries, sink }
        }
    }
}

struct FailedAttempts {
    count: u32,
    first_failed_at: DateTime<Utc>,
}

pub struct QueueConsumer {
    queue: Arc<dyn MessageQueue>,
    handler: Arc<dyn MessageHandler>,
    policy: RedeliveryPolicy,
    metrics: Option<Arc<Metrics>>,
    health: Option<ActorRef<HealthMonitorActor>>,
    attempts: HashMap<DeliveryTag, FailedAttempts>,
    retry_backoff: Duration,
}

impl QueueConsumer {
    pub fn new(queue: Arc<dyn MessageQueue>, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            queue,
            handler,
            policy: RedeliveryPolicy::Unbounded,
            metrics: None,
            health: None,
            attempts: HashMap::new(),
            retry_backoff: RETRY_BACKOFF,
        }
    }

    pub fn with_redelivery_policy(mut self, policy: RedeliveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_health_monitor(mut self, health: ActorRef<HealthMonitorActor>) -> Self {
        self.health = Some(health);
        self
    }

    /// Pause between retries of a failed receive or requeue.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Spawns the receive loop on its own task. The caller owns teardown and
    /// stops the loop by aborting the returned handle.
    pub fn start_consumer(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let queue_name = self.queue.name().to_string();
        tracing::info!(queue = %queue_name, "🎧 Consumer started");
        self.report_health(HealthStatus::Healthy).await;

        let mut degraded = false;

        loop {
            match self.queue.receive().await {
                Ok(delivery) => {
                    if degraded {
                        degraded = false;
                        self.report_health(HealthStatus::Healthy).await;
                    }
                    if let Err(e) = self.process(delivery).await {
                        tracing::error!(
                            error = %e,
                            queue = %queue_name,
                            "🛑 Consumer stopping, message could not be requeued"
                        );
                        self.report_health(HealthStatus::Unhealthy(format!("requeue failed: {}", e)))
                            .await;
                        break;
                    }
                }
                Err(BrokerError::Closed(_)) => {
                    tracing::info!(queue = %queue_name, "Queue closed, consumer stopping");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, queue = %queue_name, "Failed to receive message");
                    degraded = true;
                    self.report_health(HealthStatus::Degraded(format!("receive failed: {}", e)))
                        .await;
                    tokio::time::sleep(self.retry_backoff).await;
                }
            }
        }
    }

    /// Errors only when the message could be neither acked nor requeued.
    async fn process(&mut self, delivery: Delivery) -> Result<(), BrokerError> {
        let queue_name = self.queue.name().to_string();
        if let Some(ref metrics) = self.metrics {
            metrics.record_received(&queue_name);
        }

        let started = Instant::now();
        let result = self.handler.handle(&delivery.payload).await;
        let elapsed = started.elapsed().as_secs_f64();

        let error = match result {
            Ok(()) => {
                self.ack(&delivery).await;
                if let Some(ref metrics) = self.metrics {
                    metrics.record_acked(&queue_name, elapsed);
                }
                return Ok(());
            }
            Err(e) => e,
        };

        let attempts = self
            .attempts
            .entry(delivery.tag.clone())
            .or_insert_with(|| FailedAttempts {
                count: 0,
                first_failed_at: Utc::now(),
            });
        attempts.count += 1;
        let (count, first_failed_at) = (attempts.count, attempts.first_failed_at);

        tracing::warn!(
            error = %format!("{:#}", error),
            delivery = %delivery.tag,
            attempt = count,
            "Message handling failed"
        );

        let exhausted = match &self.policy {
            RedeliveryPolicy::DeadLetterAfter { max_deliveries, sink } if count >= *max_deliveries => {
                Some(sink.clone())
            }
            _ => None,
        };

        if let Some(sink) = exhausted {
            let letter = DeadLetter {
                id: Uuid::new_v4(),
                queue: queue_name.clone(),
                partition: delivery.tag.partition,
                offset: delivery.tag.offset,
                payload: String::from_utf8_lossy(&delivery.payload).into_owned(),
                error_message: format!("{:#}", error),
                delivery_count: count as i32,
                first_failed_at,
                dead_lettered_at: Utc::now(),
            };

            match sink.dead_letter(letter).await {
                Ok(()) => {
                    tracing::warn!(
                        delivery = %delivery.tag,
                        deliveries = count,
                        "☠️ Message moved to dead letter store"
                    );
                    self.ack(&delivery).await;
                    if let Some(ref metrics) = self.metrics {
                        metrics.record_dead_lettered(&queue_name);
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        delivery = %delivery.tag,
                        "Failed to write dead letter, requeueing"
                    );
                }
            }
        }

        self.requeue(&delivery).await?;
        if let Some(ref metrics) = self.metrics {
            metrics.record_requeued(&queue_name, elapsed);
        }
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let mut attempt = 1;
        loop {
            match self.queue.requeue(delivery).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_REQUEUE_ATTEMPTS => {
                    tracing::warn!(
                        error = %e,
                        delivery = %delivery.tag,
                        attempt,
                        "Failed to requeue message, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Acks and drops failure counts at or below the acked offset. Offsets a
    /// rebalance moved elsewhere are never seen again by this consumer.
    async fn ack(&mut self, delivery: &Delivery) {
        let tag = &delivery.tag;
        self.attempts.retain(|seen, _| {
            seen.topic != tag.topic || seen.partition != tag.partition || seen.offset > tag.offset
        });

        match self.queue.ack(delivery).await {
            Ok(()) => tracing::debug!(delivery = %delivery.tag, "Acked message"),
            Err(e) => tracing::warn!(
                error = %e,
                delivery = %delivery.tag,
                "Failed to ack message (it may be redelivered)"
            ),
        }
    }

    async fn report_health(&self, status: HealthStatus) {
        if let Some(ref health) = self.health {
            let update = UpdateHealth {
                component: format!("consumer:{}", self.queue.name()),
                status,
                details: None,
            };
            if let Err(e) = health.tell(update).send().await {
                tracing::debug!(error = %e, "Health monitor unavailable");
            }
        }
    }
}
