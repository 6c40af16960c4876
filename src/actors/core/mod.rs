// ============================================================================
// Core Actor Abstractions
// ============================================================================
//
// Health types shared by the monitor actor and the components it watches.
//
// ============================================================================

pub mod health;

pub use health::*;
