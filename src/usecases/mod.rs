// ============================================================================
// Use Cases - order lifecycle orchestration
// ============================================================================

mod order_consumer;
mod order_usecase;

pub use order_consumer::{OrderPaidHandler, OrderStatusHandler};
pub use order_usecase::{OrderUseCase, UseCaseError};
