// ============================================================================
// spark-spawn - Primitives Module
// Core reactive primitives: signal, derived
// ============================================================================

pub mod derived;
pub mod signal;

// Re-export for convenience
pub use derived::{derived, update_derived_chain, Derived, DerivedInner};
pub use signal::{signal, Signal};
