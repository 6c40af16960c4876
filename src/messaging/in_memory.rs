use async_trait::async_trait;
use rdkafka::error::KafkaError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::publisher::{PublishError, Publisher};
use super::queue::{BrokerError, Delivery, DeliveryTag, MessageQueue};

// ============================================================================
// In-Memory Broker - test doubles with broker-like ack semantics
// ============================================================================
//
// InMemoryQueue hands out messages in offset order. A requeued message goes
// back to the front, which mirrors seeking the partition back to its offset.
// Once closed and drained, receive reports `BrokerError::Closed`.
//
// ============================================================================

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Delivery>,
    next_offset: i64,
    closed: bool,
    acked: Vec<DeliveryTag>,
    requeued: Vec<DeliveryTag>,
    failing_requeues: u32,
}

#[derive(Clone)]
pub struct InMemoryQueue {
    name: String,
    state: Arc<Mutex<QueueState>>,
    available: Arc<Notify>,
}

impl InMemoryQueue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(QueueState::default())),
            available: Arc::new(Notify::new()),
        }
    }

    pub fn push(&self, payload: impl Into<Vec<u8>>) {
        let mut state = self.state.lock().unwrap();
        let offset = state.next_offset;
        state.next_offset += 1;
        state.pending.push_back(Delivery {
            tag: DeliveryTag {
                topic: self.name.clone(),
                partition: 0,
                offset,
            },
            payload: payload.into(),
        });
        drop(state);
        self.available.notify_one();
    }

    /// Receive returns `Closed` once the remaining messages are drained.
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
        self.available.notify_one();
    }

    /// Fails the next `times` requeues, as a seek during a rebalance does.
    pub fn fail_requeues(&self, times: u32) {
        self.state.lock().unwrap().failing_requeues = times;
    }

    pub fn acked(&self) -> Vec<DeliveryTag> {
        self.state.lock().unwrap().acked.clone()
    }

    pub fn requeued(&self) -> Vec<DeliveryTag> {
        self.state.lock().unwrap().requeued.clone()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(&self) -> Result<Delivery, BrokerError> {
        loop {
            {
                let mut state = self.state.lock().unwrap();
                if let Some(delivery) = state.pending.pop_front() {
                    return Ok(delivery);
                }
                if state.closed {
                    return Err(BrokerError::Closed(self.name.clone()));
                }
            }
            self.available.notified().await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        self.state.lock().unwrap().acked.push(delivery.tag.clone());
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_requeues > 0 {
            state.failing_requeues -= 1;
            return Err(BrokerError::Kafka(KafkaError::Seek(
                "Local: Erroneous state".to_string(),
            )));
        }
        state.requeued.push(delivery.tag.clone());
        state.pending.push_front(delivery.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub destination: String,
    pub payload: serde_json::Value,
}

#[derive(Clone, Default)]
pub struct InMemoryPublisher {
    published: Arc<Mutex<Vec<PublishedMessage>>>,
    fail: Arc<Mutex<bool>>,
    fail_next: Arc<Mutex<u32>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Fails only the next `times` publishes.
    pub fn fail_next(&self, times: u32) {
        *self.fail_next.lock().unwrap() = times;
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, destination: &str, payload: &[u8]) -> Result<(), PublishError> {
        if *self.fail.lock().unwrap() {
            return Err(PublishError::CircuitOpen("in-memory".to_string()));
        }
        {
            let mut fail_next = self.fail_next.lock().unwrap();
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(PublishError::CircuitOpen("in-memory".to_string()));
            }
        }
        let payload = serde_json::from_slice(payload).unwrap_or(serde_json::Value::Null);
        self.published.lock().unwrap().push(PublishedMessage {
            destination: destination.to_string(),
            payload,
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), PublishError> {
        Ok(())
    }
}
