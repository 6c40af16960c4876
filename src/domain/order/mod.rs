// ============================================================================
// Order Domain - Production Order Model
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (Order, OrderItem, Product, OrderStatus, OrderId)
// - Integration events (paid-order and status payloads)
// - Errors (OrderError enum)
//
// Persistence and messaging live outside the domain.
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod errors;

pub use value_objects::*;
pub use events::*;
pub use errors::*;
