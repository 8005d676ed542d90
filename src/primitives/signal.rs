// ============================================================================
// spark-spawn - Signals
// Writable values whose readers go stale when they change
// ============================================================================

use std::fmt;
use std::rc::Rc;

use crate::core::context::with_context;
use crate::core::types::{AnySource, SourceInner};
use crate::reactivity::tracking::{notify_write, track_read};

/// A writable reactive value.
///
/// A spawner or derived that reads it becomes one of its readers. A write
/// that changes the value marks every reader stale once and forgets them;
/// they sign up again the next time they run.
///
/// ```
/// use spark_spawn::signal;
///
/// let visible = signal(8usize);
/// assert_eq!(visible.get(), 8);
///
/// assert!(visible.set(12));
/// assert!(!visible.set(12)); // same value, nobody notified
/// ```
pub struct Signal<T> {
    inner: Rc<SourceInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SourceInner::new(value)),
        }
    }

    /// Clone out the value. Tracked.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        track_read(self.as_any_source());
        self.inner.get()
    }

    /// Clone out the value without becoming a reader.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.inner.get()
    }

    /// Borrow the value. Tracked.
    ///
    /// ```
    /// use spark_spawn::signal;
    ///
    /// let labels = signal(vec!["hp", "mp"]);
    /// assert_eq!(labels.with(|l| l.len()), 2);
    /// ```
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        track_read(self.as_any_source());
        self.inner.with(f)
    }

    /// Store `value`. Readers are only notified if it differs from the
    /// current one; the return value says whether it did.
    pub fn set(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        let changed = self.inner.replace_if_changed(value);
        if changed {
            self.publish();
        }
        changed
    }

    /// Mutate in place. Always counts as a change.
    ///
    /// ```
    /// use spark_spawn::signal;
    ///
    /// let slots = signal(vec![0u8; 2]);
    /// slots.update(|s| s.push(0));
    /// assert_eq!(slots.with(Vec::len), 3);
    /// ```
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.inner.modify(f);
        self.publish();
    }

    fn publish(&self) {
        let version = with_context(|ctx| ctx.next_write_version());
        self.inner.set_write_version(version);
        notify_write(self.as_any_source());
    }

    /// Spawners and deriveds that will be told about the next change.
    pub fn reader_count(&self) -> usize {
        self.inner.observers().len()
    }

    pub fn inner(&self) -> &Rc<SourceInner<T>> {
        &self.inner
    }

    pub fn as_any_source(&self) -> Rc<dyn AnySource> {
        self.inner.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner
            .with(|value| f.debug_tuple("Signal").field(value).finish())
    }
}

/// Create a [`Signal`].
pub fn signal<T: 'static>(value: T) -> Signal<T> {
    Signal::new(value)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::*;
    use crate::core::types::{AnyReaction, MockReaction};
    use crate::reactivity::tracking::track;

    fn reader() -> Rc<dyn AnyReaction> {
        Rc::new(MockReaction::new())
    }

    #[test]
    fn set_reports_change() {
        let s = signal(1);
        assert!(s.set(2));
        assert_eq!(s.get(), 2);
        assert!(!s.set(2));
    }

    #[test]
    fn clones_share_one_value() {
        let a = signal(String::from("left"));
        let b = a.clone();
        a.set("right".into());
        assert_eq!(b.peek(), "right");
    }

    #[test]
    fn debug_shows_value() {
        assert_eq!(format!("{:?}", signal(42)), "Signal(42)");
    }

    #[test]
    fn writes_stamp_the_global_clock() {
        let s = signal(0);
        let before = crate::core::context::write_version();
        s.set(1);
        assert_eq!(s.as_any_source().write_version(), before + 1);
        s.update(|n| *n += 1);
        assert_eq!(s.as_any_source().write_version(), before + 2);
    }

    #[test]
    fn each_reader_marked_once_then_forgotten() {
        let s = signal(0);
        let r1 = reader();
        let r2 = reader();

        track(&r1, || s.get());
        track(&r2, || s.get() + s.get());
        assert_eq!(s.reader_count(), 2);

        s.set(1);
        assert_eq!(r1.flags().status(), DIRTY);
        assert_eq!(r2.flags().status(), DIRTY);
        assert_eq!(s.reader_count(), 0);

        r1.flags().set_status(CLEAN);
        s.set(2);
        assert_eq!(r1.flags().status(), CLEAN);
    }

    #[test]
    fn equal_write_is_silent() {
        let s = signal(5);
        let r = reader();
        track(&r, || s.get());

        assert!(!s.set(5));
        assert_eq!(r.flags().status(), CLEAN);
        assert_eq!(s.reader_count(), 1);
    }

    #[test]
    fn update_always_notifies() {
        let s = signal(vec![1]);
        let r = reader();
        track(&r, || s.with(|v| v.len()));

        s.update(|_| {});
        assert_eq!(r.flags().status(), DIRTY);
    }

    #[test]
    fn peek_is_untracked() {
        let s = signal(3);
        let r = reader();

        assert_eq!(track(&r, || s.peek()), 3);
        assert_eq!(s.reader_count(), 0);
    }
}
