// ============================================================================
// spark-spawn - Derived Values
// Cached computations that sit between signals and spawners
// ============================================================================
//
// A derived is a source to whoever reads it and a reaction to whatever it
// reads. Spawners downstream of a derived are only MAYBE_DIRTY when
// something under it changes, and skip their run entirely if the derived
// recomputes to an equal value.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{addr, AnyReaction, AnySource, Flags, Observers, Sources};
use crate::reactivity::tracking::{
    deps_changed_since, reads_stale_derived, track_read, track_with_outcome,
};
use crate::spawner::evaluator::abort_cycle;

// =============================================================================
// DERIVED INNER
// =============================================================================

/// Shared state of a [`Derived`].
pub struct DerivedInner<T> {
    flags: Flags,
    compute: Box<dyn Fn() -> T>,
    cached: RefCell<Option<T>>,

    /// Write version stamped the last time the cached value changed
    changed_at: Cell<u32>,
    read_version: Cell<u32>,

    /// Global write version when the last computation returned
    ran_at: Cell<u32>,

    observers: Observers,
    sources: Sources,
    self_ref: Weak<DerivedInner<T>>,
}

impl<T: Clone + PartialEq + 'static> DerivedInner<T> {
    pub fn new(compute: impl Fn() -> T + 'static) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            flags: Flags::new(SOURCE | DERIVED | DIRTY),
            compute: Box::new(compute),
            cached: RefCell::new(None),
            changed_at: Cell::new(0),
            read_version: Cell::new(0),
            ran_at: Cell::new(0),
            observers: Observers::default(),
            sources: Sources::default(),
            self_ref: self_ref.clone(),
        })
    }

    /// The cached value.
    ///
    /// # Panics
    ///
    /// If nothing has been computed yet.
    pub fn value(&self) -> T {
        match self.cached.borrow().as_ref() {
            Some(value) => value.clone(),
            None => panic!("derived value read before its first computation"),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cached.borrow().is_some()
    }

    /// Run the computation and cache its result. Returns whether the cached
    /// value changed.
    ///
    /// Ends CLEAN unless its inputs moved during the run: DIRTY if one it
    /// read was written, MAYBE_DIRTY if a derived it read went stale.
    pub fn recompute(&self) -> bool {
        let Some(this) = self.self_ref.upgrade() else {
            return false;
        };
        let this: Rc<dyn AnyReaction> = this;

        let outcome = track_with_outcome(&this, || (self.compute)());
        let mut status = outcome.settled_status();
        if status == CLEAN && reads_stale_derived(self) {
            status = MAYBE_DIRTY;
        }

        let changed = self.cached.borrow().as_ref() != Some(&outcome.value);
        self.ran_at.set(with_context(|ctx| ctx.write_version()));
        if changed {
            *self.cached.borrow_mut() = Some(outcome.value);
            self.changed_at.set(with_context(|ctx| ctx.next_write_version()));
        }

        self.flags.set_status(status);
        changed
    }
}

impl<T: Clone + PartialEq + 'static> AnySource for DerivedInner<T> {
    fn flags(&self) -> &Flags {
        &self.flags
    }

    fn write_version(&self) -> u32 {
        self.changed_at.get()
    }

    fn set_write_version(&self, version: u32) {
        self.changed_at.set(version);
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

    fn as_reaction(&self) -> Option<Rc<dyn AnyReaction>> {
        self.self_ref.upgrade().map(|rc| rc as Rc<dyn AnyReaction>)
    }
}

impl<T: Clone + PartialEq + 'static> AnyReaction for DerivedInner<T> {
    fn flags(&self) -> &Flags {
        &self.flags
    }

    fn sources(&self) -> &Sources {
        &self.sources
    }

    fn update(&self) -> bool {
        self.recompute()
    }

    fn last_run_version(&self) -> u32 {
        self.ran_at.get()
    }

    fn as_source(&self) -> Option<Rc<dyn AnySource>> {
        self.self_ref.upgrade().map(|rc| rc as Rc<dyn AnySource>)
    }
}

// =============================================================================
// DERIVED<T>
// =============================================================================

/// A cached computation over signals (and other deriveds).
///
/// Computed on first read and again only after an input changed. Reading one
/// inside a spawner makes the spawner depend on the derived's value rather
/// than on everything the derived reads.
///
/// ```
/// use spark_spawn::{derived, signal};
///
/// let width = signal(300u32);
/// let columns = derived({
///     let width = width.clone();
///     move || width.get() / 100
/// });
/// assert_eq!(columns.get(), 3);
///
/// width.set(320); // still 3 columns
/// assert_eq!(columns.get(), 3);
/// ```
pub struct Derived<T> {
    inner: Rc<DerivedInner<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Derived<T> {
    /// Current value, recomputing first if an input changed. Tracked.
    pub fn get(&self) -> T {
        let source = self.as_any_source();
        update_derived_chain(source.clone());
        track_read(source);
        self.inner.value()
    }

    pub fn inner(&self) -> &Rc<DerivedInner<T>> {
        &self.inner
    }

    pub fn as_any_source(&self) -> Rc<dyn AnySource> {
        self.inner.clone()
    }

    pub fn as_any_reaction(&self) -> Rc<dyn AnyReaction> {
        self.inner.clone()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Derived")
            .field("cached", &self.inner.cached.borrow())
            .field("status", &(self.inner.flags.status()))
            .finish()
    }
}

/// Create a [`Derived`]. Nothing runs until the first read.
pub fn derived<T, F>(compute: F) -> Derived<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    Derived {
        inner: DerivedInner::new(compute),
    }
}

// =============================================================================
// BRINGING A DERIVED UP TO DATE
// =============================================================================

/// Recompute `target` and every stale derived under it, deepest first.
///
/// A MAYBE_DIRTY derived whose inputs all came out unchanged goes back to
/// CLEAN without running.
///
/// Reading a derived that is still computing closes a loop. If a spawner
/// started after that derived is on the stack, that spawner's run is
/// aborted and fails with [`SpawnError::Reentrant`](crate::SpawnError).
///
/// # Panics
///
/// On a loop made of deriveds alone.
pub fn update_derived_chain(target: Rc<dyn AnySource>) {
    if target.flags().has(UPDATING) {
        closed_loop(&target);
    }
    if !target.flags().is_stale() {
        return;
    }

    let mut order = vec![target];
    let mut seen = vec![addr(&order[0])];
    let mut next = 0;

    while let Some(current) = order.get(next).cloned() {
        next += 1;
        let Some(reaction) = current.as_reaction() else {
            continue;
        };
        for dep in reaction.sources().snapshot() {
            let wanted = dep.is_derived() && dep.flags().is_stale() && !dep.flags().has(UPDATING);
            if wanted && !seen.contains(&addr(&dep)) {
                seen.push(addr(&dep));
                order.push(dep);
            }
        }
    }

    for current in order.iter().rev() {
        let flags = current.flags();
        if !flags.is_stale() || flags.has(UPDATING) {
            continue;
        }
        let Some(reaction) = current.as_reaction() else {
            continue;
        };

        if flags.has(DIRTY) || deps_changed_since(&*reaction, reaction.last_run_version()) {
            reaction.update();
        } else {
            flags.set_status(CLEAN);
        }
    }
}

fn closed_loop(target: &Rc<dyn AnySource>) -> ! {
    match with_context(|ctx| ctx.spawner_above(addr(target))) {
        Some(spawner) => abort_cycle(&spawner),
        None => panic!("derived read itself while computing"),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::signal::signal;

    fn counter() -> Rc<Cell<u32>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn computes_lazily_and_caches() {
        let runs = counter();
        let d = derived({
            let runs = runs.clone();
            move || {
                runs.set(runs.get() + 1);
                "ready"
            }
        });

        assert_eq!(runs.get(), 0);
        assert_eq!(d.get(), "ready");
        assert_eq!(d.get(), "ready");
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn follows_its_signal() {
        let rows = signal(2usize);
        let cells = derived({
            let rows = rows.clone();
            move || rows.get() * 4
        });

        assert_eq!(cells.get(), 8);
        rows.set(5);
        assert_eq!(cells.get(), 20);
    }

    #[test]
    fn both_halves_point_at_each_other() {
        let d = derived(|| 7);

        let source = d.as_any_source();
        assert!(source.is_derived());
        assert!(source.flags().has(SOURCE));
        assert!(source.as_reaction().is_some());
        assert!(d.as_any_reaction().as_source().is_some());
    }

    #[test]
    fn chained_deriveds_settle_together() {
        let a = signal(1);
        let b = derived({
            let a = a.clone();
            move || a.get() * 2
        });
        let c = derived({
            let b = b.clone();
            move || b.get() + 10
        });

        assert_eq!(c.get(), 12);
        a.set(5);

        assert_eq!(b.inner().flags.status(), DIRTY);
        assert_eq!(c.inner().flags.status(), MAYBE_DIRTY);

        assert_eq!(c.get(), 20);
        assert_eq!(b.inner().flags.status(), CLEAN);
        assert_eq!(c.inner().flags.status(), CLEAN);
    }

    #[test]
    fn unchanged_middle_stops_the_chain() {
        let c_runs = counter();
        let a = signal(0);
        let bucket = derived({
            let a = a.clone();
            move || a.get() / 10
        });
        let c = derived({
            let (bucket, c_runs) = (bucket.clone(), c_runs.clone());
            move || {
                c_runs.set(c_runs.get() + 1);
                bucket.get() * 100
            }
        });

        assert_eq!(c.get(), 0);
        a.set(5);
        assert_eq!(c.get(), 0);
        assert_eq!(c_runs.get(), 1);

        a.set(15);
        assert_eq!(c.get(), 100);
        assert_eq!(c_runs.get(), 2);
    }

    #[test]
    fn diamond_runs_the_join_once() {
        let joins = counter();
        let a = signal(1);
        let left = derived({
            let a = a.clone();
            move || a.get() + 10
        });
        let right = derived({
            let a = a.clone();
            move || a.get() * 10
        });
        let join = derived({
            let (left, right, joins) = (left.clone(), right.clone(), joins.clone());
            move || {
                joins.set(joins.get() + 1);
                left.get() + right.get()
            }
        });

        assert_eq!(join.get(), 21);
        a.set(2);
        assert_eq!(join.get(), 32);
        assert_eq!(joins.get(), 2);
    }

    #[test]
    fn switching_branch_forgets_the_old_one() {
        let use_a = signal(true);
        let a = signal(1);
        let b = signal(2);
        let runs = counter();

        let d = derived({
            let (use_a, a, b, runs) = (use_a.clone(), a.clone(), b.clone(), runs.clone());
            move || {
                runs.set(runs.get() + 1);
                if use_a.get() { a.get() } else { b.get() }
            }
        });

        assert_eq!(d.get(), 1);
        b.set(20);
        assert_eq!(d.get(), 1);
        assert_eq!(runs.get(), 1);

        use_a.set(false);
        assert_eq!(d.get(), 20);
        a.set(10);
        assert_eq!(d.get(), 20);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn upstream_write_during_compute_leaves_it_maybe_dirty() {
        let base = signal(1);
        let doubled = derived({
            let base = base.clone();
            move || base.get() * 2
        });
        let nudged = Rc::new(Cell::new(false));
        let outer = derived({
            let (base, doubled, nudged) = (base.clone(), doubled.clone(), nudged.clone());
            move || {
                let seen = doubled.get();
                if !nudged.replace(true) {
                    base.set(4);
                }
                seen + 1
            }
        });

        assert_eq!(outer.get(), 3);
        assert_eq!(outer.inner().flags.status(), MAYBE_DIRTY);

        // The next read notices the doubled input moved
        assert_eq!(outer.get(), 9);
        assert_eq!(outer.inner().flags.status(), CLEAN);

        base.set(5);
        assert_eq!(outer.get(), 11);
    }

    #[test]
    fn loop_of_deriveds_panics() {
        let slot: Rc<RefCell<Option<Derived<i32>>>> = Rc::new(RefCell::new(None));
        let d = derived({
            let slot = slot.clone();
            move || match slot.borrow().as_ref() {
                Some(me) => me.get() + 1,
                None => 0,
            }
        });
        *slot.borrow_mut() = Some(d.clone());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| d.get()));
        assert!(result.is_err());
        assert_eq!(crate::core::context::tracking_depth(), 0);

        slot.borrow_mut().take();
    }
}
