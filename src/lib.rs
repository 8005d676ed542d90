// ============================================================================
// spark-spawn - Reactive Spawners for a 2D Scene Graph
// ============================================================================
//
// A node's `spawner` holds a function producing its children. Signals read
// while the function runs become dependencies; writing any of them marks the
// children stale so they are rebuilt on the next `children()` read (lazy) or
// the next `refresh_frame()` pass (eager).
//
// Single-threaded: handles are `Rc`-based and the reactive context is
// thread-local.
// ============================================================================

#[macro_use]
mod macros;

pub mod core;
pub mod error;
pub mod primitives;
pub mod reactivity;
pub mod scene;
pub mod spawner;

// Re-export core items at crate root for ergonomic access
pub use core::constants;
pub use core::context::{
    frame_number, is_tracking, is_untracking, read_version, tracking_depth, with_context,
    write_version, ReactiveContext,
};
pub use core::types::{AnyReaction, AnySource, Flags, SourceInner};

// Errors
pub use error::{SpawnError, SpawnResult};

// Primitives
pub use primitives::derived::{derived, Derived, DerivedInner};
pub use primitives::signal::{signal, Signal};

// Reactivity
pub use reactivity::scheduling::{pending_refresh_count, refresh_frame, FrameReport};
pub use reactivity::tracking::{is_dirty, mark_reactions, notify_write, track, track_read};
pub use reactivity::untrack::{peek, untrack};

// Scene and spawners
pub use scene::node::{Node, NodeId};
pub use spawner::evaluator::{EvaluatorState, Spawner, SpawnerEvaluator};
pub use spawner::options::{RefreshPolicy, SpawnerOptions};
pub use spawner::pool::{pool_spawner, Pool};
pub use spawner::registry::{ChildRegistry, ChildrenSnapshot};

// =============================================================================
// TESTS
// =============================================================================
