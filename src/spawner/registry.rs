// ============================================================================
// spark-spawn - Child Registry
// The materialized children of a node, plus generation-tagged snapshots
// ============================================================================
//
// The current sequence is a shared immutable `Rc<[Node]>`. Replacing it swaps
// the pointer and bumps the generation; snapshots keep their own `Rc`, so a
// snapshot can go stale but never observes a half-written sequence.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{SpawnError, SpawnResult};
use crate::scene::node::Node;

// =============================================================================
// REGISTRY INNER
// =============================================================================

struct RegistryInner {
    nodes: RefCell<Rc<[Node]>>,
    generation: Cell<u64>,
}

// =============================================================================
// CHILD REGISTRY
// =============================================================================

/// The current children of one parent node.
///
/// Generation starts at 0 (no children ever assigned) and increases by one on
/// every [`replace`](ChildRegistry::replace). Clones are handles to the same
/// registry.
#[derive(Clone)]
pub struct ChildRegistry {
    inner: Rc<RegistryInner>,
}

impl ChildRegistry {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                nodes: RefCell::new(Rc::from(Vec::new())),
                generation: Cell::new(0),
            }),
        }
    }

    /// Swap in a new child sequence. Returns the new generation.
    pub fn replace(&self, nodes: Vec<Node>) -> u64 {
        let fresh: Rc<[Node]> = Rc::from(nodes);
        // Drop the old sequence after the borrow ends
        let _old = self.inner.nodes.replace(fresh);
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);
        generation
    }

    /// Take an O(1) snapshot of the current children.
    pub fn snapshot(&self) -> ChildrenSnapshot {
        ChildrenSnapshot {
            nodes: self.inner.nodes.borrow().clone(),
            generation: self.inner.generation.get(),
            registry: Rc::downgrade(&self.inner),
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.get()
    }

    pub fn len(&self) -> usize {
        self.inner.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ChildRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChildRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildRegistry")
            .field("generation", &self.generation())
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// CHILDREN SNAPSHOT
// =============================================================================

/// An immutable view of a node's children at one generation.
///
/// Checked accessors fail with [`SpawnError::StaleSnapshot`] once the parent
/// has spawned a newer generation, so code holding a snapshot across a frame
/// finds out instead of silently using outdated nodes.
///
/// # Example
///
/// ```
/// use spark_spawn::{signal, Node, Spawner};
///
/// let count = signal(2);
/// let parent = Node::new();
/// let c = count.clone();
/// parent.set_spawner(Some(Spawner::new(move || {
///     (0..c.get()).map(|_| Node::new()).collect()
/// })));
///
/// let old = parent.children().unwrap();
/// assert_eq!(old.nodes().unwrap().len(), 2);
///
/// count.set(3);
/// let new = parent.children().unwrap();
/// assert!(old.is_stale());
/// assert!(old.nodes().is_err());
/// assert_eq!(new.len(), 3);
/// ```
#[derive(Clone)]
pub struct ChildrenSnapshot {
    nodes: Rc<[Node]>,
    generation: u64,
    registry: Weak<RegistryInner>,
}

impl ChildrenSnapshot {
    /// Generation this snapshot was taken at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True once the registry moved past this generation (or was dropped).
    pub fn is_stale(&self) -> bool {
        self.current_generation() != Some(self.generation)
    }

    fn current_generation(&self) -> Option<u64> {
        self.registry.upgrade().map(|r| r.generation.get())
    }

    fn check(&self) -> SpawnResult<()> {
        match self.current_generation() {
            Some(current) if current == self.generation => Ok(()),
            current => Err(SpawnError::StaleSnapshot {
                taken: self.generation,
                current,
            }),
        }
    }

    /// All nodes, if the snapshot is still current.
    pub fn nodes(&self) -> SpawnResult<&[Node]> {
        self.check()?;
        Ok(&self.nodes)
    }

    /// The node at `index`, if the snapshot is still current.
    pub fn get(&self, index: usize) -> SpawnResult<&Node> {
        self.check()?;
        self.nodes.get(index).ok_or(SpawnError::IndexOutOfRange {
            index,
            len: self.nodes.len(),
        })
    }

    pub fn iter(&self) -> SpawnResult<std::slice::Iter<'_, Node>> {
        self.check()?;
        Ok(self.nodes.iter())
    }

    pub fn contains(&self, node: &Node) -> SpawnResult<bool> {
        self.check()?;
        Ok(self.nodes.contains(node))
    }

    /// The sequence as it was at this generation, without the staleness check.
    pub fn as_slice_unchecked(&self) -> &[Node] {
        &self.nodes
    }
}

impl fmt::Debug for ChildrenSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildrenSnapshot")
            .field("generation", &self.generation)
            .field("nodes", &&*self.nodes)
            .field("stale", &self.is_stale())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
