// ============================================================================
// Messaging Module - broker plumbing
// ============================================================================
//
// - connection: shared Kafka client settings
// - publisher:  exchange-bound, fire-and-forget producer behind a breaker
// - queue:      manual-ack consumer group (commit / seek)
// - consumer:   sequential receive loop with redelivery policy
// - notifier:   order status announcements
//
// ============================================================================

// Private module declarations
mod connection;
mod consumer;
mod notifier;
mod publisher;
mod queue;

#[cfg(test)]
pub mod in_memory;

// Re-export for public API
pub use connection::KafkaConnection;
pub use consumer::{MessageHandler, QueueConsumer, RedeliveryPolicy};
pub use notifier::{BrokerOrderNotifier, NotifyError, OrderNotifier};
pub use publisher::{KafkaPublisher, Publisher};
pub use queue::KafkaQueue;
