// ============================================================================
// spark-spawn - Reactivity Module
// Dependency tracking, dirty propagation and the frame refresh pass
// ============================================================================

pub mod scheduling;
pub mod tracking;
pub mod untrack;

// Re-export main tracking functions
pub use tracking::{
    deps_changed_since, install_dependencies, is_dirty, mark_reactions, notify_write, track,
    track_read, track_with_outcome, Tracked,
};

// Re-export scheduling functions
pub use scheduling::{pending_refresh_count, refresh_frame, FrameReport};

// Re-export untracked reads
pub use untrack::{peek, untrack};
