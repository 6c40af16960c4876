// ============================================================================
// Store - Persistence Layer
// ============================================================================
//
// Durable state owned by this service:
// - production orders (OrderRepository, backed by ScyllaDB)
// - dead-lettered messages (DeadLetterSink, backed by ScyllaDB)
//
// Callers depend on the traits; the Scylla adapters are wired in main.
//
// ============================================================================

pub mod order_repository;
pub mod scylla_order_repository;
pub mod dead_letter_store;

#[cfg(test)]
pub mod in_memory;

pub use order_repository::{OrderRepository, RepositoryError};
pub use scylla_order_repository::ScyllaOrderRepository;
pub use dead_letter_store::{DeadLetter, DeadLetterSink, ScyllaDeadLetterStore};
