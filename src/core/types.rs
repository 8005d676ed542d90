// ============================================================================
// spark-spawn - Graph Types
// Flag cells, observer and dependency lists, and the type-erased traits
// ============================================================================
//
// The graph never needs a value's type to propagate a change, so edges are
// stored type-erased:
//
//   source  --Observers (Weak<dyn AnyReaction>)-->  reaction
//   reaction --Sources  (Rc<dyn AnySource>)----->   source
//
// Reactions own their inputs strongly; sources only point back weakly, so a
// dropped spawner or derived disappears from the graph on its own.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::constants::*;
use crate::error::SpawnResult;

// =============================================================================
// FLAGS
// =============================================================================

/// A `u32` bit set of the constants in [`constants`](super::constants).
#[derive(Debug, Default)]
pub struct Flags(Cell<u32>);

impl Flags {
    pub fn new(bits: u32) -> Self {
        Self(Cell::new(bits))
    }

    pub fn bits(&self) -> u32 {
        self.0.get()
    }

    /// True if any of `bits` is set.
    pub fn has(&self, bits: u32) -> bool {
        self.0.get() & bits != 0
    }

    pub fn insert(&self, bits: u32) {
        self.0.set(self.0.get() | bits);
    }

    pub fn remove(&self, bits: u32) {
        self.0.set(self.0.get() & !bits);
    }

    /// The one status bit currently set.
    pub fn status(&self) -> u32 {
        self.0.get() & STATUS_BITS
    }

    /// Swap the status bit, leaving kind and markers alone.
    pub fn set_status(&self, status: u32) {
        debug_assert_eq!(status & !STATUS_BITS, 0);
        self.0.set((self.0.get() & !STATUS_BITS) | status);
    }

    /// DIRTY or MAYBE_DIRTY.
    pub fn is_stale(&self) -> bool {
        self.has(DIRTY | MAYBE_DIRTY)
    }
}

// =============================================================================
// OBSERVERS (source -> reaction edges)
// =============================================================================

/// Weak back-links from a source to the reactions that read it.
#[derive(Default)]
pub struct Observers {
    list: RefCell<Vec<Weak<dyn AnyReaction>>>,
}

impl Observers {
    pub fn add(&self, reaction: &Rc<dyn AnyReaction>) {
        self.list.borrow_mut().push(Rc::downgrade(reaction));
    }

    /// Drop `reaction`, and any dead entry met along the way.
    pub fn remove(&self, reaction: &Rc<dyn AnyReaction>) {
        let target = Rc::as_ptr(reaction) as *const ();
        self.list
            .borrow_mut()
            .retain(|weak| weak.strong_count() > 0 && weak.as_ptr() as *const () != target);
    }

    /// Empty the list, returning whoever is still alive.
    pub fn drain(&self) -> Vec<Rc<dyn AnyReaction>> {
        self.list
            .take()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Live observers, leaving the list subscribed.
    pub fn live(&self) -> Vec<Rc<dyn AnyReaction>> {
        let mut list = self.list.borrow_mut();
        list.retain(|weak| weak.strong_count() > 0);
        list.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn len(&self) -> usize {
        self.list
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// SOURCES (reaction -> source edges)
// =============================================================================

/// The inputs a reaction read during its last run, in first-read order.
#[derive(Default)]
pub struct Sources {
    list: RefCell<Vec<Rc<dyn AnySource>>>,
}

impl Sources {
    pub fn len(&self) -> usize {
        self.list.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.borrow().is_empty()
    }

    /// Cloned handles, so callers can walk them while the graph changes.
    pub fn snapshot(&self) -> Vec<Rc<dyn AnySource>> {
        self.list.borrow().clone()
    }

    pub fn replace(&self, sources: Vec<Rc<dyn AnySource>>) -> Vec<Rc<dyn AnySource>> {
        self.list.replace(sources)
    }
}

// =============================================================================
// TYPE-ERASED TRAITS
// =============================================================================

/// Anything a reaction can read: signals and deriveds.
pub trait AnySource: Any {
    fn flags(&self) -> &Flags;

    /// Global write version stamped by the last change.
    fn write_version(&self) -> u32;
    fn set_write_version(&self, version: u32);

    /// Read version of the last frame that recorded this source.
    fn read_version(&self) -> u32;
    fn set_read_version(&self, version: u32);

    fn observers(&self) -> &Observers;

    /// The reaction half of a derived.
    fn as_reaction(&self) -> Option<Rc<dyn AnyReaction>> {
        None
    }

    fn is_derived(&self) -> bool {
        self.flags().has(DERIVED)
    }
}

/// Anything that re-runs when its inputs change: deriveds and spawner
/// evaluators.
pub trait AnyReaction: Any {
    fn flags(&self) -> &Flags;

    fn sources(&self) -> &Sources;

    /// Run again. Returns whether the output changed.
    fn update(&self) -> bool;

    /// Run on behalf of the frame refresh pass. Returns whether the reaction
    /// actually ran; spawners surface their error here.
    fn refresh(&self) -> SpawnResult<bool> {
        Ok(self.update())
    }

    /// Global write version when the last run finished (0 = never ran).
    fn last_run_version(&self) -> u32 {
        0
    }

    /// The source half of a derived.
    fn as_source(&self) -> Option<Rc<dyn AnySource>> {
        None
    }

    fn is_spawner(&self) -> bool {
        self.flags().has(SPAWNER)
    }

    fn is_updating(&self) -> bool {
        self.flags().has(UPDATING)
    }
}

/// Data address of a graph handle, for identity checks across trait objects.
pub(crate) fn addr<T: ?Sized>(rc: &Rc<T>) -> *const () {
    Rc::as_ptr(rc) as *const ()
}

// =============================================================================
// SOURCE INNER (the data behind Signal<T>)
// =============================================================================

/// Shared state of a signal.
pub struct SourceInner<T> {
    flags: Flags,
    value: RefCell<T>,
    write_version: Cell<u32>,
    read_version: Cell<u32>,
    observers: Observers,
}

impl<T> SourceInner<T> {
    pub fn new(value: T) -> Self {
        Self {
            flags: Flags::new(SOURCE | CLEAN),
            value: RefCell::new(value),
            write_version: Cell::new(0),
            read_version: Cell::new(0),
            observers: Observers::default(),
        }
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Store `value` unless it equals the current one. Returns whether it
    /// was stored.
    pub fn replace_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        if *self.value.borrow() == value {
            return false;
        }
        *self.value.borrow_mut() = value;
        true
    }

    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.value.borrow_mut());
    }
}

impl<T: 'static> AnySource for SourceInner<T> {
    fn flags(&self) -> &Flags {
        &self.flags
    }

    fn write_version(&self) -> u32 {
        self.write_version.get()
    }

    fn set_write_version(&self, version: u32) {
        self.write_version.set(version);
    }

    fn read_version(&self) -> u32 {
        self.read_version.get()
    }

    fn set_read_version(&self, version: u32) {
        self.read_version.set(version);
    }

    fn observers(&self) -> &Observers {
        &self.observers
    }
}

// =============================================================================
// TEST SUPPORT
// =============================================================================

/// A bare reaction for exercising graph plumbing in unit tests.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MockReaction {
    pub flags: Flags,
    pub sources: Sources,
    pub updates: Cell<u32>,
}

#[cfg(test)]
impl MockReaction {
    pub fn new() -> Self {
        Self {
            flags: Flags::new(CLEAN),
            ..Default::default()
        }
    }
}

#[cfg(test)]
impl AnyReaction for MockReaction {
    fn flags(&self) -> &Flags {
        &self.flags
    }

    fn sources(&self) -> &Sources {
        &self.sources
    }

    fn update(&self) -> bool {
        self.updates.set(self.updates.get() + 1);
        true
    }
}

// =============================================================================
// TESTS
// =============================================================================
