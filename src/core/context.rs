// ============================================================================
// spark-spawn - Reactive Context
// Per-thread evaluation stack, version clocks and the eager refresh queue
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::constants::SPAWNER;
use super::types::{addr, AnyReaction, AnySource};

// =============================================================================
// TRACKING FRAME
// =============================================================================

/// A run in progress: who is running, and what it has read so far.
pub struct TrackingFrame {
    pub reaction: Weak<dyn AnyReaction>,

    /// Stamped on every source this frame records, so a repeat read is a
    /// single compare.
    pub read_version: u32,

    /// First-read order
    pub deps: Vec<Rc<dyn AnySource>>,

    /// A source in `deps` was written before the run finished
    pub self_invalidated: bool,

    /// A derived in `deps` went stale before the run finished
    pub upstream_invalidated: bool,

    prev_untracking: bool,
}

impl TrackingFrame {
    fn has_read(&self, source: &Rc<dyn AnySource>) -> bool {
        let target = addr(source);
        self.deps.iter().any(|dep| addr(dep) == target)
    }

    fn runs(&self, target: *const ()) -> bool {
        self.reaction.as_ptr() as *const () == target
    }
}

// =============================================================================
// REACTIVE CONTEXT
// =============================================================================

/// Everything the graph shares on one thread.
pub struct ReactiveContext {
    /// Innermost run last
    pub frames: RefCell<Vec<TrackingFrame>>,

    pub untracking: Cell<bool>,

    /// Bumped by every change to any source
    pub write_clock: Cell<u32>,

    /// Bumped by every frame push
    pub read_clock: Cell<u32>,

    /// Eager spawners due on the next pass, oldest first
    pub refresh_queue: RefCell<Vec<Weak<dyn AnyReaction>>>,

    pub frames_refreshed: Cell<u64>,
}

impl ReactiveContext {
    pub fn new() -> Self {
        Self {
            frames: RefCell::new(Vec::new()),
            untracking: Cell::new(false),
            write_clock: Cell::new(1),
            read_clock: Cell::new(0),
            refresh_queue: RefCell::new(Vec::new()),
            frames_refreshed: Cell::new(0),
        }
    }

    // =========================================================================
    // FRAMES
    // =========================================================================

    /// Start recording reads for `reaction`. Returns the frame's read version.
    ///
    /// Tracking is switched back on inside the frame: a spawner or derived
    /// first evaluated under `untrack()` still needs its own inputs.
    pub fn push_frame(&self, reaction: Weak<dyn AnyReaction>) -> u32 {
        let read_version = self.next_read_version();
        let prev_untracking = self.untracking.replace(false);
        self.frames.borrow_mut().push(TrackingFrame {
            reaction,
            read_version,
            deps: Vec::new(),
            self_invalidated: false,
            upstream_invalidated: false,
            prev_untracking,
        });
        read_version
    }

    pub fn pop_frame(&self) -> Option<TrackingFrame> {
        let frame = self.frames.borrow_mut().pop()?;
        self.untracking.set(frame.prev_untracking);
        Some(frame)
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn has_active_reaction(&self) -> bool {
        !self.frames.borrow().is_empty()
    }

    /// Add `source` to the innermost frame's reads.
    ///
    /// False when nothing is recording or the frame already has it.
    pub fn record_read(&self, source: &Rc<dyn AnySource>) -> bool {
        if self.untracking.get() {
            return false;
        }

        let mut frames = self.frames.borrow_mut();
        let Some(frame) = frames.last_mut() else {
            return false;
        };

        if source.read_version() == frame.read_version || frame.has_read(source) {
            return false;
        }

        source.set_read_version(frame.read_version);
        frame.deps.push(source.clone());
        true
    }

    /// A source was written: every running frame that already read it will
    /// finish stale. Returns how many frames that hit.
    pub fn note_write(&self, source: &Rc<dyn AnySource>) -> usize {
        self.flag_readers(source, |frame| frame.self_invalidated = true)
    }

    /// A derived went stale because something under it was written. Running
    /// frames that already read it must re-check it after they finish.
    pub fn note_upstream_write(&self, derived: &Rc<dyn AnySource>) -> usize {
        self.flag_readers(derived, |frame| frame.upstream_invalidated = true)
    }

    fn flag_readers(&self, source: &Rc<dyn AnySource>, mark: impl Fn(&mut TrackingFrame)) -> usize {
        let mut hit = 0;
        for frame in self.frames.borrow_mut().iter_mut() {
            if frame.has_read(source) {
                mark(frame);
                hit += 1;
            }
        }
        hit
    }

    /// Running spawner closest to the top of the stack, counting only frames
    /// started after `target`'s own frame.
    ///
    /// Used when `target` is read while it is still computing: that spawner
    /// is the nested attempt which closed the loop.
    pub fn spawner_above(&self, target: *const ()) -> Option<Rc<dyn AnyReaction>> {
        let frames = self.frames.borrow();
        let start = frames.iter().rposition(|frame| frame.runs(target))?;
        frames[start + 1..]
            .iter()
            .rev()
            .filter_map(|frame| frame.reaction.upgrade())
            .find(|reaction| reaction.flags().has(SPAWNER))
    }

    pub fn set_untracking(&self, value: bool) -> bool {
        self.untracking.replace(value)
    }

    pub fn is_untracking(&self) -> bool {
        self.untracking.get()
    }

    // =========================================================================
    // CLOCKS
    // =========================================================================

    pub fn next_write_version(&self) -> u32 {
        let v = self.write_clock.get() + 1;
        self.write_clock.set(v);
        v
    }

    pub fn write_version(&self) -> u32 {
        self.write_clock.get()
    }

    pub fn next_read_version(&self) -> u32 {
        let v = self.read_clock.get() + 1;
        self.read_clock.set(v);
        v
    }

    pub fn read_version(&self) -> u32 {
        self.read_clock.get()
    }

    // =========================================================================
    // REFRESH QUEUE
    // =========================================================================

    /// Queue an eager spawner.
    ///
    /// Entries whose node was dropped are pruned whenever the queue is about
    /// to grow its allocation, so it stays bounded without a pass.
    pub fn enqueue_refresh(&self, reaction: Weak<dyn AnyReaction>) {
        let mut queue = self.refresh_queue.borrow_mut();
        if queue.len() == queue.capacity() {
            queue.retain(|weak| weak.strong_count() > 0);
        }
        queue.push(reaction);
    }

    pub fn take_refresh_queue(&self) -> Vec<Weak<dyn AnyReaction>> {
        self.refresh_queue.take()
    }

    /// Put unfinished entries back ahead of anything queued meanwhile.
    pub fn requeue_front(&self, mut reactions: Vec<Weak<dyn AnyReaction>>) {
        let mut queue = self.refresh_queue.borrow_mut();
        reactions.append(&mut queue);
        *queue = reactions;
    }

    /// Live entries only.
    pub fn refresh_queue_len(&self) -> usize {
        self.refresh_queue
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Raw entries, dropped nodes included.
    pub fn refresh_queue_slots(&self) -> usize {
        self.refresh_queue.borrow().len()
    }

    pub fn advance_frame(&self) -> u64 {
        let n = self.frames_refreshed.get() + 1;
        self.frames_refreshed.set(n);
        n
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// THREAD-LOCAL ACCESS
// =============================================================================

thread_local! {
    static CONTEXT: ReactiveContext = ReactiveContext::new();
}

/// Run `f` against this thread's context.
///
/// ```ignore
/// let now = with_context(|ctx| ctx.write_version());
/// ```
pub fn with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> R {
    CONTEXT.with(f)
}

/// Inside a tracked run and not under `untrack()`.
pub fn is_tracking() -> bool {
    with_context(|ctx| ctx.has_active_reaction() && !ctx.is_untracking())
}

pub fn is_untracking() -> bool {
    with_context(|ctx| ctx.is_untracking())
}

/// How many tracked runs are nested right now.
pub fn tracking_depth() -> usize {
    with_context(|ctx| ctx.frame_depth())
}

pub fn write_version() -> u32 {
    with_context(|ctx| ctx.write_version())
}

pub fn read_version() -> u32 {
    with_context(|ctx| ctx.read_version())
}

/// Completed frame refresh passes on this thread.
pub fn frame_number() -> u64 {
    with_context(|ctx| ctx.frames_refreshed.get())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MockReaction, SourceInner};

    fn mock() -> Rc<dyn AnyReaction> {
        Rc::new(MockReaction::new())
    }

    #[test]
    fn fresh_context() {
        with_context(|ctx| {
            assert_eq!(ctx.write_version(), 1);
            assert_eq!(ctx.read_version(), 0);
            assert!(!ctx.has_active_reaction());
            assert!(!ctx.is_untracking());
        });
        assert!(!is_tracking());
        assert_eq!(tracking_depth(), 0);
        assert_eq!(frame_number(), 0);
    }

    #[test]
    fn clocks_only_move_forward() {
        with_context(|ctx| {
            let w = ctx.write_version();
            assert_eq!(ctx.next_write_version(), w + 1);
            assert_eq!(ctx.write_version(), w + 1);

            let r = ctx.read_version();
            assert_eq!(ctx.next_read_version(), r + 1);
        });
    }

    #[test]
    fn no_frame_no_read() {
        let source: Rc<dyn AnySource> = Rc::new(SourceInner::new(1));
        assert!(!with_context(|ctx| ctx.record_read(&source)));
    }

    #[test]
    fn nested_frames_record_independently() {
        let source: Rc<dyn AnySource> = Rc::new(SourceInner::new(1));
        let outer = mock();
        let inner = mock();

        with_context(|ctx| {
            ctx.set_untracking(true);
            ctx.push_frame(Rc::downgrade(&outer));
            assert!(!ctx.is_untracking());

            assert!(ctx.record_read(&source));
            assert!(!ctx.record_read(&source));

            ctx.push_frame(Rc::downgrade(&inner));
            assert!(ctx.record_read(&source));
            assert_eq!(ctx.pop_frame().unwrap().deps.len(), 1);

            assert!(!ctx.record_read(&source));
            assert_eq!(ctx.note_write(&source), 1);

            let frame = ctx.pop_frame().unwrap();
            assert_eq!(frame.deps.len(), 1);
            assert!(frame.self_invalidated);
            assert!(!frame.upstream_invalidated);

            assert!(ctx.is_untracking());
            ctx.set_untracking(false);
        });
    }

    #[test]
    fn upstream_note_only_hits_readers() {
        let derived: Rc<dyn AnySource> = Rc::new(SourceInner::new(0));
        let reader = mock();
        let bystander = mock();

        with_context(|ctx| {
            ctx.push_frame(Rc::downgrade(&reader));
            ctx.record_read(&derived);
            ctx.push_frame(Rc::downgrade(&bystander));

            assert_eq!(ctx.note_upstream_write(&derived), 1);

            let top = ctx.pop_frame().unwrap();
            assert!(!top.upstream_invalidated);
            let bottom = ctx.pop_frame().unwrap();
            assert!(bottom.upstream_invalidated);
            assert!(!bottom.self_invalidated);
        });
    }

    #[test]
    fn spawner_above_finds_the_nested_spawner() {
        let computing = mock();
        let plain = mock();
        let spawner = mock();
        spawner.flags().insert(SPAWNER);
        let outer_spawner = mock();
        outer_spawner.flags().insert(SPAWNER);

        with_context(|ctx| {
            ctx.push_frame(Rc::downgrade(&outer_spawner));
            ctx.push_frame(Rc::downgrade(&computing));
            ctx.push_frame(Rc::downgrade(&spawner));
            ctx.push_frame(Rc::downgrade(&plain));

            let found = ctx.spawner_above(addr(&computing)).unwrap();
            assert!(Rc::ptr_eq(&found, &spawner));
            // Nothing runs `plain` below itself
            assert!(ctx.spawner_above(addr(&plain)).is_none());

            for _ in 0..4 {
                ctx.pop_frame();
            }
        });
    }

    #[test]
    fn requeue_goes_to_the_front() {
        let a = mock();
        let b = mock();

        with_context(|ctx| {
            ctx.enqueue_refresh(Rc::downgrade(&b));
            ctx.requeue_front(vec![Rc::downgrade(&a)]);
            assert_eq!(ctx.refresh_queue_len(), 2);

            let queue = ctx.take_refresh_queue();
            assert!(Rc::ptr_eq(&queue[0].upgrade().unwrap(), &a));
            assert!(Rc::ptr_eq(&queue[1].upgrade().unwrap(), &b));
            assert_eq!(ctx.refresh_queue_len(), 0);
        });
    }

    #[test]
    fn dropped_entries_do_not_pile_up() {
        with_context(|ctx| {
            for _ in 0..1000 {
                let gone = mock();
                ctx.enqueue_refresh(Rc::downgrade(&gone));
            }
            assert_eq!(ctx.refresh_queue_len(), 0);
            assert!(ctx.refresh_queue_slots() <= 64);
            ctx.take_refresh_queue();
        });
    }
}
