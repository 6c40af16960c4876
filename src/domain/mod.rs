// ============================================================================
// Domain Layer
// ============================================================================
//
// Pure order model: no I/O, no broker or store types.
//
// ============================================================================

pub mod order;
