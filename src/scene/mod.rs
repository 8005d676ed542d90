// ============================================================================
// spark-spawn - Scene Module
// ============================================================================

pub mod node;

pub use node::{Node, NodeId};
