// ============================================================================
// spark-spawn - Frame Refresh Scheduling
// The eager path: re-run stale spawners once per animation frame
// ============================================================================
//
// Lazy spawners only re-run when someone reads their children. Eager ones
// are queued the moment they go stale and re-run here, once per frame, so
// layout/render code that walks the tree sees fresh children without each
// caller having to pull them.
//
// A pass only processes what was queued before it started. Spawners that go
// stale during the pass (including ones that invalidate themselves) wait for
// the next frame, so a pass always terminates.
// ============================================================================

use std::rc::Rc;

use tracing::debug;

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::error::SpawnResult;
use crate::reactivity::tracking::is_dirty;

// =============================================================================
// FRAME REPORT
// =============================================================================

/// What a single refresh pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame number of this pass (1-based, per thread)
    pub frame: u64,

    /// Spawners that were re-evaluated
    pub refreshed: usize,

    /// Queued spawners that did not run: already clean (read lazily in the
    /// meantime), or only maybe stale with every upstream derived unchanged
    pub skipped: usize,

    /// Spawners queued during this pass, left for the next frame
    pub deferred: usize,
}

// =============================================================================
// REFRESH FRAME
// =============================================================================

/// Run one frame refresh pass over every queued eager spawner.
///
/// Each queued spawner is evaluated at most once. The first failure stops the
/// pass: the failing spawner and everything not yet processed stay queued and
/// the error is returned to the caller. Nothing is retried automatically.
///
/// # Example
///
/// ```
/// use spark_spawn::{refresh_frame, signal, Node, RefreshPolicy, Spawner, SpawnerOptions};
///
/// let count = signal(3);
/// let parent = Node::with_options(SpawnerOptions::new().refresh(RefreshPolicy::Eager));
/// let c = count.clone();
/// parent.set_spawner(Some(Spawner::new(move || {
///     (0..c.get()).map(|_| spark_spawn::Node::new()).collect()
/// })));
///
/// let report = refresh_frame().unwrap();
/// assert_eq!(report.refreshed, 1);
/// assert_eq!(parent.generation(), 1);
///
/// count.set(4);
/// refresh_frame().unwrap();
/// assert_eq!(parent.generation(), 2);
/// ```
pub fn refresh_frame() -> SpawnResult<FrameReport> {
    let queue = with_context(|ctx| ctx.take_refresh_queue());
    let frame = with_context(|ctx| ctx.advance_frame());
    let mut report = FrameReport {
        frame,
        ..FrameReport::default()
    };

    let mut seen: Vec<*const ()> = Vec::with_capacity(queue.len());
    let mut pending = queue.into_iter();

    while let Some(weak) = pending.next() {
        let Some(reaction) = weak.upgrade() else {
            continue;
        };

        let ptr = Rc::as_ptr(&reaction) as *const ();
        if seen.contains(&ptr) {
            continue;
        }
        seen.push(ptr);

        reaction.flags().remove(QUEUED);

        if !is_dirty(&*reaction) {
            report.skipped += 1;
            continue;
        }

        let ran = match reaction.refresh() {
            Ok(ran) => ran,
            Err(err) => {
                let mut rest = vec![weak];
                rest.extend(pending);
                for entry in &rest {
                    if let Some(r) = entry.upgrade() {
                        r.flags().insert(QUEUED);
                    }
                }
                let left = rest.len();
                with_context(|ctx| ctx.requeue_front(rest));
                debug!(frame, refreshed = report.refreshed, left, error = %err, "frame refresh aborted");
                return Err(err);
            }
        };

        // MAYBE_DIRTY whose deriveds settled unchanged
        if ran {
            report.refreshed += 1;
        } else {
            report.skipped += 1;
        }
    }

    report.deferred = with_context(|ctx| ctx.refresh_queue_len());
    debug!(
        frame,
        refreshed = report.refreshed,
        skipped = report.skipped,
        deferred = report.deferred,
        "frame refresh complete"
    );
    Ok(report)
}

/// Number of eager spawners waiting for the next refresh pass.
pub fn pending_refresh_count() -> usize {
    with_context(|ctx| ctx.refresh_queue_len())
}

// =============================================================================
// TESTS
// =============================================================================
