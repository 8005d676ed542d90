// ============================================================================
// spark-spawn - Core Module
// Fundamental types, traits, and context for the reactive system
// ============================================================================

pub mod constants;
pub mod context;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use context::{
    frame_number, is_tracking, is_untracking, read_version, tracking_depth, with_context,
    write_version, ReactiveContext, TrackingFrame,
};
pub use types::{AnyReaction, AnySource, Flags, Observers, SourceInner, Sources};
