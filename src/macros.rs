// ============================================================================
// spark-spawn - Ergonomic Macros
// ============================================================================

/// Helper macro to clone variables into a move closure.
///
/// This reduces the boilerplate of manually cloning `Rc`, `Signal` or `Node`
/// handles before moving them into a closure.
///
/// # Usage
///
/// ```rust
/// use spark_spawn::{cloned, derived, signal};
///
/// let a = signal(1);
/// let b = signal(2);
///
/// let sum = derived(cloned!(a, b => move || a.get() + b.get()));
/// assert_eq!(sum.get(), 3);
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Create a derived signal with automatic variable capturing.
///
/// Wraps `derived(cloned!(... => move || ...))`.
///
/// # Usage
///
/// ```rust
/// use spark_spawn::signal;
///
/// let a = signal(1);
/// let b = signal(2);
/// let sum = spark_spawn::derived!(a, b => a.get() + b.get());
/// assert_eq!(sum.get(), 3);
/// ```
#[macro_export]
macro_rules! derived {
    ($($deps:ident),+ => $body:expr) => {
        $crate::derived($crate::cloned!($($deps),+ => move || $body))
    };
    ($body:expr) => {
        $crate::derived(move || $body)
    };
}

/// Create an infallible [`Spawner`](crate::Spawner) with automatic variable
/// capturing.
///
/// Wraps `Spawner::new(cloned!(... => move || ...))`.
///
/// # Usage
///
/// ```rust
/// use spark_spawn::{signal, spawner, Node};
///
/// let count = signal(3usize);
/// let parent = Node::new();
/// parent.set_spawner(Some(spawner!(count => {
///     (0..count.get()).map(|_| Node::new()).collect()
/// })));
///
/// assert_eq!(parent.children().unwrap().len(), 3);
/// ```
#[macro_export]
macro_rules! spawner {
    ($($deps:ident),+ => $body:expr) => {
        $crate::Spawner::new($crate::cloned!($($deps),+ => move || $body))
    };
    ($body:expr) => {
        $crate::Spawner::new(move || $body)
    };
}
