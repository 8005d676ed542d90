// ============================================================================
// spark-spawn - Spawner Evaluator
// The per-node reaction that runs a spawner and installs its children
// ============================================================================
//
// State machine (status flags on the reaction):
//
//   Stale (DIRTY / MAYBE_DIRTY) --read or frame pass--> Evaluating --> Clean
//   Clean --tracked dependency written--> Stale
//   Evaluating --nested evaluation attempt--> Reentrant error
//   Evaluating --loop closed through a derived--> run unwound, Reentrant error
//
// Evaluation is all-or-nothing: the registry is only touched after the
// spawner returned successfully and no nested attempt was made.
// ============================================================================

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{AnyReaction, Flags, Sources};
use crate::error::{SpawnError, SpawnResult};
use crate::primitives::signal::Signal;
use crate::reactivity::tracking::{
    deps_changed_since, reads_stale_derived, run_as, schedule_refresh, track_with_outcome,
};
use crate::scene::node::{Node, NodeId};
use crate::spawner::options::RefreshPolicy;
use crate::spawner::registry::ChildRegistry;

// =============================================================================
// SPAWNER FUNCTION
// =============================================================================

type SpawnFn = dyn Fn() -> SpawnResult<Vec<Node>>;

/// A function producing a node's children.
///
/// Cheap to clone. Two spawners are equal only if they share the same
/// function, so setting a node's spawner to a clone of its current one is a
/// no-op.
#[derive(Clone)]
pub struct Spawner {
    func: Rc<SpawnFn>,
}

impl Spawner {
    /// Wrap an infallible spawner function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Vec<Node> + 'static,
    {
        Self {
            func: Rc::new(move || Ok(f())),
        }
    }

    /// Wrap a spawner function that can fail.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_spawn::{Node, SpawnError, Spawner};
    ///
    /// let parent = Node::new();
    /// parent.set_spawner(Some(Spawner::try_new(|| Err(SpawnError::spawner("no data")))));
    /// assert!(parent.children().is_err());
    /// assert_eq!(parent.generation(), 0);
    /// ```
    pub fn try_new<F>(f: F) -> Self
    where
        F: Fn() -> SpawnResult<Vec<Node>> + 'static,
    {
        Self { func: Rc::new(f) }
    }

    /// Run the function.
    pub fn call(&self) -> SpawnResult<Vec<Node>> {
        (self.func)()
    }
}

impl PartialEq for Spawner {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.func) as *const () == Rc::as_ptr(&other.func) as *const ()
    }
}

impl Eq for Spawner {}

impl fmt::Debug for Spawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Spawner({:p})", Rc::as_ptr(&self.func) as *const ())
    }
}

// =============================================================================
// EVALUATOR STATE
// =============================================================================

/// Public view of where an evaluator is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluatorState {
    /// Children reflect every dependency's current value
    Clean,
    /// A dependency changed (or nothing was computed yet)
    Stale,
    /// The spawner function is running right now
    Evaluating,
}

// =============================================================================
// CYCLE ABORT
// =============================================================================

/// Unwind payload that stops a spawner run which read a derived still
/// computing further down the stack.
pub(crate) struct CycleAbort;

/// Abort the run of `spawner`, which closed a loop through a derived.
///
/// Unwinds to the innermost evaluation, which turns it into
/// [`SpawnError::Reentrant`]. Needs `panic = "unwind"`.
pub(crate) fn abort_cycle(spawner: &Rc<dyn AnyReaction>) -> ! {
    spawner.flags().insert(REENTERED);
    warn!("spawner read a derived that is still computing, run aborted");
    panic::resume_unwind(Box::new(CycleAbort))
}

// =============================================================================
// SPAWNER EVALUATOR
// =============================================================================

/// The reaction behind a node's children.
///
/// Reads the node's spawner signal and runs the spawner under dependency
/// tracking. Holds a clone of the node's registry handle, never the node
/// itself, so children don't keep their evaluator alive.
pub struct SpawnerEvaluator {
    node: NodeId,
    flags: Flags,
    spawner: Signal<Option<Spawner>>,
    registry: ChildRegistry,
    sources: Sources,
    last_run: Cell<u32>,
    evaluations: Cell<u64>,
    self_ref: Weak<SpawnerEvaluator>,
}

impl SpawnerEvaluator {
    pub(crate) fn new(
        node: NodeId,
        spawner: Signal<Option<Spawner>>,
        registry: ChildRegistry,
        policy: RefreshPolicy,
    ) -> Rc<Self> {
        let flags = Flags::new(SPAWNER | DIRTY);
        if policy == RefreshPolicy::Eager {
            flags.insert(EAGER);
        }

        let evaluator = Rc::new_cyclic(|self_ref| Self {
            node,
            flags,
            spawner,
            registry,
            sources: Sources::default(),
            last_run: Cell::new(0),
            evaluations: Cell::new(0),
            self_ref: self_ref.clone(),
        });

        // Starts stale, so an eager one is due on the first frame
        let as_reaction: Rc<dyn AnyReaction> = evaluator.clone();
        schedule_refresh(&as_reaction);

        evaluator
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn state(&self) -> EvaluatorState {
        if self.flags.has(UPDATING) {
            EvaluatorState::Evaluating
        } else if self.flags.has(CLEAN) {
            EvaluatorState::Clean
        } else {
            EvaluatorState::Stale
        }
    }

    /// Number of times the spawner ran to completion and replaced children.
    pub fn evaluation_count(&self) -> u64 {
        self.evaluations.get()
    }

    pub fn policy(&self) -> RefreshPolicy {
        if self.flags.has(EAGER) {
            RefreshPolicy::Eager
        } else {
            RefreshPolicy::Lazy
        }
    }

    /// Bring the children up to date, evaluating if a dependency changed.
    ///
    /// Returns whether the spawner ran. Fails with
    /// [`SpawnError::Reentrant`] if this evaluator is already running, or if
    /// bringing its inputs up to date leads back into a derived that is
    /// still computing.
    pub fn ensure_fresh(&self) -> SpawnResult<bool> {
        if self.flags.has(UPDATING) {
            self.flags.insert(REENTERED);
            warn!(node = %self.node, "re-entrant spawner evaluation rejected");
            return Err(SpawnError::Reentrant { node: self.node });
        }

        if self.flags.has(DIRTY) {
            return self.evaluate().map(|_| true);
        }

        if self.flags.has(MAYBE_DIRTY) {
            if self.inputs_changed()? {
                return self.evaluate().map(|_| true);
            }
            self.flags.set_status(CLEAN);
            trace!(node = %self.node, "upstream derived unchanged, children kept");
        }

        Ok(false)
    }

    /// Settle the deriveds this spawner read and report whether any input
    /// moved past the last run. Runs on the stack as this evaluator, so a
    /// derived that loops back here aborts the check instead of panicking.
    fn inputs_changed(&self) -> SpawnResult<bool> {
        let Some(this) = self.self_ref.upgrade() else {
            return Ok(false);
        };
        let this: Rc<dyn AnyReaction> = this;

        self.flags.remove(REENTERED);
        let since = self.last_run.get();
        let changed = self.catching_cycles(|| run_as(&this, || deps_changed_since(self, since)));

        if self.flags.has(REENTERED) {
            self.flags.remove(REENTERED);
            warn!(node = %self.node, "input check looped back into this spawner");
            return Err(SpawnError::Reentrant { node: self.node });
        }
        changed
    }

    /// Run the spawner once, unconditionally.
    fn evaluate(&self) -> SpawnResult<()> {
        let Some(this) = self.self_ref.upgrade() else {
            return Ok(());
        };
        let this: Rc<dyn AnyReaction> = this;

        trace!(node = %self.node, "spawner evaluating");
        self.flags.remove(REENTERED);

        let outcome = self.catching_cycles(|| {
            track_with_outcome(&this, || match self.spawner.get() {
                Some(spawner) => spawner.call().map(Some),
                None => Ok(None),
            })
        });

        self.last_run.set(with_context(|ctx| ctx.write_version()));

        let reentered = self.flags.has(REENTERED);
        self.flags.remove(REENTERED);

        let result = match outcome {
            Ok(_) if reentered => Err(SpawnError::Reentrant { node: self.node }),
            Ok(outcome) => {
                let mut status = outcome.settled_status();
                if status == CLEAN && reads_stale_derived(self) {
                    status = MAYBE_DIRTY;
                }
                outcome
                    .value
                    .map(|children| (children, status))
                    .map_err(|err| err.on_node(self.node))
            }
            Err(err) => Err(err),
        };

        let (children, status) = match result {
            Ok(done) => done,
            Err(err) => {
                self.flags.set_status(DIRTY);
                debug!(node = %self.node, error = %err, "spawner evaluation failed, children kept");
                return Err(err);
            }
        };

        if let Some(children) = children {
            let len = children.len();
            let generation = self.registry.replace(children);
            self.evaluations.set(self.evaluations.get() + 1);
            trace!(node = %self.node, generation, len, "children replaced");
        }

        self.flags.set_status(status);
        if status != CLEAN {
            debug!(node = %self.node, status, "inputs moved during the run, stays stale");
            schedule_refresh(&this);
        }

        Ok(())
    }

    /// Turn a [`CycleAbort`] unwinding out of `f` into an error for this
    /// node. Any other panic keeps unwinding.
    fn catching_cycles<R>(&self, f: impl FnOnce() -> R) -> SpawnResult<R> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Ok(value),
            Err(payload) if payload.is::<CycleAbort>() => {
                Err(SpawnError::Reentrant { node: self.node })
            }
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

impl AnyReaction for SpawnerEvaluator {
    fn flags(&self) -> &Flags {
        &self.flags
    }

    fn sources(&self) -> &Sources {
        &self.sources
    }

    fn update(&self) -> bool {
        self.ensure_fresh().unwrap_or(false)
    }

    fn refresh(&self) -> SpawnResult<bool> {
        self.ensure_fresh()
    }

    fn last_run_version(&self) -> u32 {
        self.last_run.get()
    }
}

impl fmt::Debug for SpawnerEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnerEvaluator")
            .field("node", &self.node)
            .field("state", &self.state())
            .field("policy", &self.policy())
            .field("deps", &self.sources.len())
            .field("evaluations", &self.evaluations.get())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
