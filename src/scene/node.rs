// ============================================================================
// spark-spawn - Scene Node
// Identity-bearing node handle owning a child registry and a spawner
// ============================================================================

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::types::AnyReaction;
use crate::error::SpawnResult;
use crate::primitives::signal::Signal;
use crate::spawner::evaluator::{EvaluatorState, Spawner, SpawnerEvaluator};
use crate::spawner::options::{RefreshPolicy, SpawnerOptions};
use crate::spawner::registry::{ChildRegistry, ChildrenSnapshot};

// =============================================================================
// NODE ID
// =============================================================================

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// NODE
// =============================================================================

struct NodeInner {
    id: NodeId,
    label: Option<String>,
    spawner: Signal<Option<Spawner>>,
    registry: ChildRegistry,
    evaluator: Rc<SpawnerEvaluator>,
}

/// A scene-graph node as far as spawning is concerned.
///
/// Cloning yields another handle to the same node; equality and hashing go
/// by [`NodeId`]. Rendering, layout and the rest of the node's properties
/// live outside this crate.
///
/// # Example
///
/// ```
/// use spark_spawn::{signal, Node, Spawner};
///
/// let count = signal(10);
/// let parent = Node::labeled("list");
/// let c = count.clone();
/// parent.set_spawner(Some(Spawner::new(move || {
///     (0..c.get()).map(|_| Node::new()).collect()
/// })));
///
/// assert_eq!(parent.children().unwrap().len(), 10);
/// count.set(5);
/// assert_eq!(parent.children().unwrap().len(), 5);
/// ```
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl Node {
    /// A lazy node with no label.
    pub fn new() -> Self {
        Self::with_options(SpawnerOptions::default())
    }

    pub fn labeled(label: impl Into<String>) -> Self {
        Self::with_options(SpawnerOptions::new().label(label))
    }

    pub fn with_options(options: SpawnerOptions) -> Self {
        let id = NodeId::next();
        let spawner: Signal<Option<Spawner>> = Signal::new(None);
        let registry = ChildRegistry::new();
        let evaluator =
            SpawnerEvaluator::new(id, spawner.clone(), registry.clone(), options.refresh);

        Self {
            inner: Rc::new(NodeInner {
                id,
                label: options.label,
                spawner,
                registry,
                evaluator,
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Replace the spawner. `None` stops spawning and keeps the current children.
    ///
    /// Returns false if `spawner` is the one already installed.
    pub fn set_spawner(&self, spawner: Option<Spawner>) -> bool {
        self.inner.spawner.set(spawner)
    }

    /// The signal holding this node's spawner.
    pub fn spawner(&self) -> Signal<Option<Spawner>> {
        self.inner.spawner.clone()
    }

    /// Current children, running the spawner first if anything it read changed.
    ///
    /// Errors from the spawner (including re-entrant evaluation) are returned
    /// as-is; the previous children stay in place.
    pub fn children(&self) -> SpawnResult<ChildrenSnapshot> {
        self.inner.evaluator.ensure_fresh()?;
        Ok(self.inner.registry.snapshot())
    }

    /// Assign children directly, bypassing the spawner.
    ///
    /// A spawner that later re-runs overwrites these.
    pub fn set_children(&self, children: Vec<Node>) -> u64 {
        self.inner.registry.replace(children)
    }

    pub fn state(&self) -> EvaluatorState {
        self.inner.evaluator.state()
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.inner.evaluator.policy()
    }

    /// Registry generation, without evaluating.
    pub fn generation(&self) -> u64 {
        self.inner.registry.generation()
    }

    pub fn evaluation_count(&self) -> u64 {
        self.inner.evaluator.evaluation_count()
    }

    /// Number of sources the last spawner run depended on.
    pub fn dependency_count(&self) -> usize {
        self.inner.evaluator.sources().len()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Node");
        d.field("id", &self.inner.id);
        if let Some(label) = &self.inner.label {
            d.field("label", label);
        }
        d.field("generation", &self.generation()).finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
