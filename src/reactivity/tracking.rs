// ============================================================================
// spark-spawn - Dependency Tracking
// Recording reads, installing edges, and pushing staleness downstream
// ============================================================================
//
// No RefCell borrow is held across a call back into the graph: lists are
// copied out (Observers::drain/live, Sources::snapshot) before anything is
// marked or re-run.
// ============================================================================

use std::rc::Rc;

use tracing::trace;

use crate::core::constants::*;
use crate::core::context::{with_context, TrackingFrame};
use crate::core::types::{AnyReaction, AnySource};

// =============================================================================
// TRACK
// =============================================================================

/// What a tracked run produced and what happened to its inputs meanwhile.
#[derive(Debug)]
pub struct Tracked<T> {
    pub value: T,

    /// Distinct sources read
    pub dep_count: usize,

    /// A source the run had read was written before it returned
    pub self_invalidated: bool,

    /// A derived the run had read went stale before it returned
    pub upstream_invalidated: bool,
}

impl<T> Tracked<T> {
    /// The status a reaction should settle in after this run.
    pub fn settled_status(&self) -> u32 {
        if self.self_invalidated {
            DIRTY
        } else if self.upstream_invalidated {
            MAYBE_DIRTY
        } else {
            CLEAN
        }
    }
}

/// Run `f` on behalf of `reaction` and make what it read the reaction's
/// complete input set.
///
/// Reads inside a nested `track` belong to the nested reaction.
///
/// ```ignore
/// let len = track(&reaction, || items.with(Vec::len));
/// ```
pub fn track<T>(reaction: &Rc<dyn AnyReaction>, f: impl FnOnce() -> T) -> T {
    track_with_outcome(reaction, f).value
}

/// [`track`], also reporting whether the inputs moved while `f` ran.
pub fn track_with_outcome<T>(reaction: &Rc<dyn AnyReaction>, f: impl FnOnce() -> T) -> Tracked<T> {
    let running = RunningFrame::enter(reaction);
    let value = f();

    let Some(frame) = running.leave() else {
        return Tracked {
            value,
            dep_count: 0,
            self_invalidated: false,
            upstream_invalidated: false,
        };
    };

    let dep_count = frame.deps.len();
    install_dependencies(reaction, frame.deps);

    Tracked {
        value,
        dep_count,
        self_invalidated: frame.self_invalidated,
        upstream_invalidated: frame.upstream_invalidated,
    }
}

/// Run `f` with `reaction` marked as running, keeping its inputs as they
/// are. Reads made directly inside `f` are dropped.
pub(crate) fn run_as<T>(reaction: &Rc<dyn AnyReaction>, f: impl FnOnce() -> T) -> T {
    let running = RunningFrame::enter(reaction);
    let value = f();
    running.leave();
    value
}

/// A pushed frame plus UPDATING on its reaction. Unwinding out of the run
/// still pops the frame and clears the flag.
struct RunningFrame<'a> {
    reaction: &'a Rc<dyn AnyReaction>,
    open: bool,
}

impl<'a> RunningFrame<'a> {
    fn enter(reaction: &'a Rc<dyn AnyReaction>) -> Self {
        reaction.flags().insert(UPDATING);
        with_context(|ctx| ctx.push_frame(Rc::downgrade(reaction)));
        Self { reaction, open: true }
    }

    fn leave(mut self) -> Option<TrackingFrame> {
        self.open = false;
        let frame = with_context(|ctx| ctx.pop_frame());
        self.reaction.flags().remove(UPDATING);
        frame
    }
}

impl Drop for RunningFrame<'_> {
    fn drop(&mut self) {
        if self.open {
            with_context(|ctx| ctx.pop_frame());
            self.reaction.flags().remove(UPDATING);
        }
    }
}

/// Record a read of `source` in the innermost running frame, if any.
pub fn track_read(source: Rc<dyn AnySource>) {
    with_context(|ctx| ctx.record_read(&source));
}

/// Swap `reaction`'s inputs for `deps`: it stops observing everything it
/// read before and observes exactly `deps` afterwards.
pub fn install_dependencies(reaction: &Rc<dyn AnyReaction>, deps: Vec<Rc<dyn AnySource>>) {
    for old in reaction.sources().replace(Vec::new()) {
        old.observers().remove(reaction);
    }
    for dep in &deps {
        dep.observers().add(reaction);
    }
    reaction.sources().replace(deps);
}

// =============================================================================
// WRITES
// =============================================================================

/// A signal changed. Called by `Signal::set`/`update` after the new value
/// and write version are stored.
pub fn notify_write(source: Rc<dyn AnySource>) {
    let running = with_context(|ctx| ctx.note_write(&source));
    if running > 0 {
        trace!(frames = running, "running evaluation read a source that was just written");
    }

    mark_reactions(source, DIRTY);
}

/// Push `status` to everything that observes `source`.
///
/// A plain source hands its whole observer list over (readers re-subscribe
/// on their next run). A derived keeps its observers, which only become
/// MAYBE_DIRTY since the derived may come out unchanged. Running frames that
/// already read a derived hit on the way are told, so they finish stale.
/// An eager spawner leaving CLEAN is queued for the next frame.
pub fn mark_reactions(source: Rc<dyn AnySource>, status: u32) {
    let mut pending = vec![(source, status)];

    while let Some((source, status)) = pending.pop() {
        let observers = if source.is_derived() {
            with_context(|ctx| ctx.note_upstream_write(&source));
            source.observers().live()
        } else {
            source.observers().drain()
        };

        for reaction in observers {
            let flags = reaction.flags();
            let was_clean = flags.has(CLEAN);

            if !flags.has(DIRTY) {
                flags.set_status(status);
            }

            if let Some(derived) = reaction.as_source() {
                pending.push((derived, MAYBE_DIRTY));
            } else if was_clean && flags.has(SPAWNER) {
                schedule_refresh(&reaction);
            }
        }
    }
}

/// Put an eager spawner on the refresh queue, once.
pub(crate) fn schedule_refresh(reaction: &Rc<dyn AnyReaction>) {
    let flags = reaction.flags();
    if !flags.has(EAGER) || flags.has(QUEUED) {
        return;
    }

    flags.insert(QUEUED);
    with_context(|ctx| ctx.enqueue_refresh(Rc::downgrade(reaction)));
    trace!("eager spawner queued for refresh");
}

// =============================================================================
// STALENESS CHECKS
// =============================================================================

/// DIRTY or MAYBE_DIRTY.
pub fn is_dirty(reaction: &dyn AnyReaction) -> bool {
    reaction.flags().is_stale()
}

/// Did any input of `reaction` change after `version`?
///
/// Stale deriveds among the inputs are recomputed first; one that comes out
/// equal keeps its old write version and so does not count.
pub fn deps_changed_since(reaction: &dyn AnyReaction, version: u32) -> bool {
    reaction.sources().snapshot().into_iter().any(|dep| {
        if dep.is_derived() {
            crate::primitives::derived::update_derived_chain(dep.clone());
        }
        dep.write_version() > version
    })
}

/// A derived among `reaction`'s inputs is stale, so what the last run saw
/// may already be out of date.
pub(crate) fn reads_stale_derived(reaction: &dyn AnyReaction) -> bool {
    reaction
        .sources()
        .snapshot()
        .iter()
        .any(|dep| dep.is_derived() && dep.flags().is_stale())
}

// =============================================================================
// TESTS
// =============================================================================
