// ============================================================================
// spark-spawn - Untracked Reads
// ============================================================================

use crate::core::context::with_context;

/// Run `f` with dependency recording switched off for the current run.
///
/// Handy inside a spawner that needs a value once (a seed, an offset)
/// without rebuilding its children every time that value moves. Deriveds
/// computed inside `f` still record their own inputs.
///
/// ```
/// use spark_spawn::{signal, untrack, Node, Spawner};
///
/// let count = signal(2);
/// let seed = signal(0);
/// let parent = Node::new();
///
/// let (c, s) = (count.clone(), seed.clone());
/// parent.set_spawner(Some(Spawner::new(move || {
///     let _seed = untrack(|| s.get());
///     (0..c.get()).map(|_| Node::new()).collect()
/// })));
///
/// let first = parent.children().unwrap();
/// seed.set(5);
/// assert_eq!(parent.children().unwrap().generation(), first.generation());
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    struct Restore(bool);

    impl Drop for Restore {
        fn drop(&mut self) {
            with_context(|ctx| ctx.set_untracking(self.0));
        }
    }

    let _restore = Restore(with_context(|ctx| ctx.set_untracking(true)));
    f()
}

/// Same as [`untrack`].
pub fn peek<T>(f: impl FnOnce() -> T) -> T {
    untrack(f)
}

// =============================================================================
// TESTS
// =============================================================================
