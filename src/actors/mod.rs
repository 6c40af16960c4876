// ============================================================================
// Actors Module
// ============================================================================
//
// Structure:
// - core/           - Health types and the HealthProbe trait
// - infrastructure/ - The kameo health monitor actor
//
// Note: Order logic lives in the use case layer, NOT in actors.
//
// ============================================================================

// Private module declarations
mod core;
mod infrastructure;

pub use self::core::{HealthProbe, HealthStatus};
pub use self::infrastructure::{GetSystemHealth, HealthMonitorActor, UpdateHealth};
