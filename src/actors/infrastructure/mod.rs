// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// Actors for system concerns. Order processing itself runs in plain
// consumer tasks; only health aggregation needs actor state.
//
// ============================================================================

// Private module declarations
mod health_monitor;

// Re-export for public API
pub use health_monitor::{HealthMonitorActor, UpdateHealth, GetSystemHealth};
