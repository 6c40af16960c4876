use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::{Message, Offset, TopicPartitionList};
use std::fmt;
use std::time::Duration;

use super::KafkaConnection;

// ============================================================================
// Message Queue - manual acknowledgment over a consumer group
// ============================================================================
//
// A queue is a topic read by a consumer group with auto-commit disabled.
// - ack:     commit offset n+1, the message is never seen again
// - requeue: seek the partition back to offset n, the message is the next
//            one delivered
//
// ============================================================================

const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Queue {0} is closed")]
    Closed(String),
}

/// Position of a message inside its queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryTag {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: DeliveryTag,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Waits for the next message.
    async fn receive(&self) -> Result<Delivery, BrokerError>;

    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError>;

    /// Negative acknowledgment with requeue.
    async fn requeue(&self, delivery: &Delivery) -> Result<(), BrokerError>;
}

pub struct KafkaQueue {
    name: String,
    consumer: StreamConsumer,
}

impl KafkaQueue {
    pub fn new(connection: &KafkaConnection, group_id: &str, queue: &str) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = connection.consumer_config(group_id).create()?;
        consumer.subscribe(&[queue])?;

        tracing::info!(
            queue = %queue,
            consumer_group = %group_id,
            manual_commit = true,
            "Subscribed to queue"
        );

        Ok(Self {
            name: queue.to_string(),
            consumer,
        })
    }
}

#[async_trait]
impl MessageQueue for KafkaQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(&self) -> Result<Delivery, BrokerError> {
        let message = self.consumer.recv().await?;

        let tag = DeliveryTag {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
        };

        tracing::trace!(delivery = %tag, "Received message");

        Ok(Delivery {
            tag,
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let tag = &delivery.tag;
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(&tag.topic, tag.partition, Offset::Offset(tag.offset + 1))?;

        self.consumer.commit(&offsets, CommitMode::Async)?;
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let tag = &delivery.tag;
        self.consumer
            .seek(&tag.topic, tag.partition, Offset::Offset(tag.offset), SEEK_TIMEOUT)?;
        Ok(())
    }
}
