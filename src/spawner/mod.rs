// ============================================================================
// spark-spawn - Spawner Module
// Spawner functions, their per-node evaluator, child registries and pools
// ============================================================================

pub mod evaluator;
pub mod options;
pub mod pool;
pub mod registry;

pub use evaluator::{EvaluatorState, Spawner, SpawnerEvaluator};
pub use options::{RefreshPolicy, SpawnerOptions};
pub use pool::{pool_spawner, Pool};
pub use registry::{ChildRegistry, ChildrenSnapshot};
