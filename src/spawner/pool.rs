// ============================================================================
// spark-spawn - Node Pool
// Fixed set of pre-built nodes that spawners select from instead of building
// ============================================================================
//
// The evaluator knows nothing about pools: a pooled spawner is just a spawner
// whose closure holds a `Pool` handle and returns a selection of it. The pool
// itself never changes membership after construction.
// ============================================================================

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use crate::error::{SpawnError, SpawnResult};
use crate::scene::node::Node;
use crate::spawner::evaluator::Spawner;

/// A fixed-capacity set of reusable nodes.
///
/// Clones share the same nodes.
///
/// # Example
///
/// ```
/// use spark_spawn::{signal, Node, Pool, Spawner};
///
/// let pool = Pool::new(64, |_| Node::new());
/// let count = signal(10);
///
/// let parent = Node::new();
/// parent.set_spawner(Some(Spawner::try_new({
///     let (pool, count) = (pool.clone(), count.clone());
///     move || pool.take(count.get())
/// })));
///
/// assert_eq!(parent.children().unwrap().len(), 10);
///
/// count.set(5);
/// let kids = parent.children().unwrap();
/// assert_eq!(kids.nodes().unwrap(), &pool.as_slice()[..5]);
/// ```
#[derive(Clone)]
pub struct Pool {
    nodes: Rc<[Node]>,
}

impl Pool {
    /// Build `capacity` nodes up front with `make(index)`.
    pub fn new(capacity: usize, make: impl FnMut(usize) -> Node) -> Self {
        Self {
            nodes: (0..capacity).map(make).collect(),
        }
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self {
            nodes: Rc::from(nodes),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.nodes.contains(node)
    }

    pub fn as_slice(&self) -> &[Node] {
        &self.nodes
    }

    /// Handles to the nodes in `range`.
    ///
    /// Fails with [`SpawnError::PoolExhausted`] if the range reaches past the
    /// pool. An inverted range selects nothing.
    pub fn slice(&self, range: Range<usize>) -> SpawnResult<Vec<Node>> {
        if range.end > self.nodes.len() {
            return Err(SpawnError::PoolExhausted {
                requested: range.end,
                capacity: self.nodes.len(),
            });
        }
        if range.start >= range.end {
            return Ok(Vec::new());
        }
        Ok(self.nodes[range].to_vec())
    }

    /// The first `n` nodes; same as `slice(0..n)`.
    pub fn take(&self, n: usize) -> SpawnResult<Vec<Node>> {
        self.slice(0..n)
    }

    /// The first `n` nodes, or the whole pool if `n` exceeds it.
    pub fn take_clamped(&self, n: usize) -> Vec<Node> {
        self.nodes[..n.min(self.nodes.len())].to_vec()
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.nodes.len())
            .finish()
    }
}

/// Build a spawner that selects its children from `pool`.
///
/// # Example
///
/// ```
/// use spark_spawn::{pool_spawner, signal, Node, Pool};
///
/// let pool = Pool::new(8, |_| Node::new());
/// let visible = signal(3usize);
///
/// let parent = Node::new();
/// let v = visible.clone();
/// parent.set_spawner(Some(pool_spawner(pool, move |p| Ok(p.take_clamped(v.get())))));
///
/// visible.set(100);
/// assert_eq!(parent.children().unwrap().len(), 8);
/// ```
pub fn pool_spawner<F>(pool: Pool, select: F) -> Spawner
where
    F: Fn(&Pool) -> SpawnResult<Vec<Node>> + 'static,
{
    Spawner::try_new(move || select(&pool))
}

// =============================================================================
// TESTS
// =============================================================================
