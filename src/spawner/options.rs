// ============================================================================
// spark-spawn - Spawner Options
// ============================================================================

/// When a stale spawner gets re-evaluated.
///
/// The default is [`Lazy`](RefreshPolicy::Lazy): a stale node waits for its
/// next `children()` read and is never touched by a frame pass. Nodes that
/// should refresh on whichever comes first, a read or the next frame, have
/// to opt into [`Eager`](RefreshPolicy::Eager).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RefreshPolicy {
    /// Only when someone reads `children()`.
    #[default]
    Lazy,

    /// On the next `children()` read or the next
    /// [`refresh_frame`](crate::refresh_frame) pass after going stale,
    /// whichever comes first.
    Eager,
}

/// Configuration for a node's spawner.
///
/// # Example
///
/// ```
/// use spark_spawn::{Node, RefreshPolicy, SpawnerOptions};
///
/// let list = Node::with_options(
///     SpawnerOptions::new()
///         .label("inventory")
///         .refresh(RefreshPolicy::Eager),
/// );
/// assert_eq!(list.label(), Some("inventory"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnerOptions {
    /// Debug label carried by the node and its log events
    pub label: Option<String>,

    pub refresh: RefreshPolicy,
}

impl SpawnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn refresh(mut self, policy: RefreshPolicy) -> Self {
        self.refresh = policy;
        self
    }

    /// Shorthand for `.refresh(RefreshPolicy::Eager)`.
    pub fn eager(self) -> Self {
        self.refresh(RefreshPolicy::Eager)
    }

    pub fn is_eager(&self) -> bool {
        self.refresh == RefreshPolicy::Eager
    }
}
