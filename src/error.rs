// ============================================================================
// spark-spawn - Errors
// ============================================================================

use thiserror::Error;

use crate::scene::node::NodeId;

/// Convenient result type for spawner operations.
pub type SpawnResult<T> = std::result::Result<T, SpawnError>;

/// Everything that can go wrong while spawning or reading children.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    /// A spawner tried to evaluate itself while already evaluating, usually
    /// by reading `children()` of its own parent.
    #[error("re-entrant spawner evaluation on node {node}")]
    Reentrant { node: NodeId },

    /// A snapshot was accessed after its registry moved to a newer generation.
    #[error("stale children snapshot: taken at generation {taken}, registry is at {}", display_generation(.current))]
    StaleSnapshot { taken: u64, current: Option<u64> },

    #[error("child index {index} out of range for {len} children")]
    IndexOutOfRange { index: usize, len: usize },

    /// A selection asked a pool for more nodes than it holds.
    #[error("pool exhausted: requested {requested} nodes, capacity is {capacity}")]
    PoolExhausted { requested: usize, capacity: usize },

    /// The spawner function itself failed.
    #[error("spawner failed on node {}: {message}", display_node(.node))]
    Spawner { node: Option<NodeId>, message: String },
}

impl SpawnError {
    /// Build a spawner failure from inside a spawner function.
    ///
    /// The evaluator fills in the node when the error passes through it.
    pub fn spawner(message: impl Into<String>) -> Self {
        Self::Spawner {
            node: None,
            message: message.into(),
        }
    }

    /// Attach the evaluating node to a spawner failure that has none yet.
    pub(crate) fn on_node(self, id: NodeId) -> Self {
        match self {
            Self::Spawner { node: None, message } => Self::Spawner {
                node: Some(id),
                message,
            },
            other => other,
        }
    }

    /// True for [`SpawnError::Reentrant`].
    pub fn is_reentrant(&self) -> bool {
        matches!(self, Self::Reentrant { .. })
    }
}

fn display_generation(current: &Option<u64>) -> String {
    match current {
        Some(generation) => generation.to_string(),
        None => "gone".to_string(),
    }
}

fn display_node(node: &Option<NodeId>) -> String {
    match node {
        Some(id) => id.to_string(),
        None => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = SpawnError::PoolExhausted {
            requested: 70,
            capacity: 64,
        };
        assert_eq!(
            err.to_string(),
            "pool exhausted: requested 70 nodes, capacity is 64"
        );

        let err = SpawnError::StaleSnapshot {
            taken: 1,
            current: None,
        };
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn spawner_error_gets_node_once() {
        let first = NodeId::from_raw(7);
        let second = NodeId::from_raw(8);

        let err = SpawnError::spawner("bad input").on_node(first).on_node(second);
        assert_eq!(
            err,
            SpawnError::Spawner {
                node: Some(first),
                message: "bad input".into()
            }
        );
        assert!(err.to_string().contains("#7"));
    }

    #[test]
    fn on_node_leaves_other_errors_alone() {
        let err = SpawnError::IndexOutOfRange { index: 3, len: 2 };
        assert_eq!(err.clone().on_node(NodeId::from_raw(1)), err);
        assert!(!err.is_reentrant());
    }
}
