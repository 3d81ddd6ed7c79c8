//! Event debouncing for live reload.
//!
//! Collapses a burst of filesystem events into one batch. Every event pushes
//! the batch deadline out by the quiet window, so a build tool writing many
//! files produces a single reload once it goes quiet.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::PathBuf;
use std::time::Duration;

use notify::EventKind;
use tokio::time::Instant;

/// Kind of filesystem event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FsEventKind {
    Created,
    Modified,
    Removed,
}

impl FsEventKind {
    /// Map a notify event kind. Access and other events are not changes.
    pub(crate) fn from_notify(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            // Renames arrive as `Modify(Name(_))`
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Removed),
            _ => None,
        }
    }

    /// Coalesce two event kinds for the same path.
    ///
    /// Returns `None` when the path was created and removed again within the batch.
    #[allow(clippy::match_same_arms)]
    fn coalesce(existing: Self, new: Self) -> Option<Self> {
        use FsEventKind::{Created, Modified, Removed};

        match (existing, new) {
            (Created, Created | Modified) => Some(Created),
            (Created, Removed) => None,
            (Modified, Created) => Some(Created),
            (Modified, Modified) => Some(Modified),
            (Modified, Removed) => Some(Removed),
            (Removed, Created) => Some(Modified), // Replaced
            (Removed, Modified | Removed) => Some(Removed),
        }
    }
}

/// A debounced burst of changes.
#[derive(Debug, Default)]
pub(crate) struct ChangeBatch {
    /// Net change per path. Empty when every change cancelled out.
    pub(crate) paths: BTreeMap<PathBuf, FsEventKind>,
}

impl ChangeBatch {
    /// Count of paths per kind, for logging.
    pub(crate) fn counts(&self) -> (usize, usize, usize) {
        self.paths
            .values()
            .fold((0, 0, 0), |(created, modified, removed), kind| match kind {
                FsEventKind::Created => (created + 1, modified, removed),
                FsEventKind::Modified => (created, modified + 1, removed),
                FsEventKind::Removed => (created, modified, removed + 1),
            })
    }
}

/// Trailing-edge debouncer for a single stream of events.
///
/// Owned by the watcher task, so no locking is needed.
pub(crate) struct EventDebouncer {
    pending: BTreeMap<PathBuf, FsEventKind>,
    deadline: Option<Instant>,
    quiet: Duration,
}

impl EventDebouncer {
    /// Create a new debouncer with the specified quiet window.
    pub(crate) fn new(quiet: Duration) -> Self {
        Self {
            pending: BTreeMap::new(),
            deadline: None,
            quiet,
        }
    }

    /// Record an event and restart the quiet window.
    pub(crate) fn record(&mut self, path: PathBuf, kind: FsEventKind) {
        self.deadline = Some(Instant::now() + self.quiet);

        match self.pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(kind);
            }
            Entry::Occupied(mut entry) => {
                if let Some(coalesced) = FsEventKind::coalesce(*entry.get(), kind) {
                    entry.insert(coalesced);
                } else {
                    entry.remove();
                }
            }
        }
    }

    /// When the pending batch becomes ready, if there is one.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the batch once its quiet window has elapsed.
    pub(crate) fn take_ready(&mut self) -> Option<ChangeBatch> {
        let deadline = self.deadline?;
        if deadline > Instant::now() {
            return None;
        }

        self.deadline = None;
        Some(ChangeBatch {
            paths: std::mem::take(&mut self.pending),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::time::advance;

    const QUIET: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_single_event_ready_after_deadline() {
        let mut debouncer = EventDebouncer::new(QUIET);
        let path = PathBuf::from("/site/index.html");

        debouncer.record(path.clone(), FsEventKind::Modified);
        assert!(debouncer.take_ready().is_none());

        advance(QUIET).await;

        let batch = debouncer.take_ready().unwrap();
        assert_eq!(batch.paths.get(&path), Some(&FsEventKind::Modified));
        assert!(debouncer.take_ready().is_none());
        assert!(debouncer.next_deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_window() {
        let mut debouncer = EventDebouncer::new(QUIET);

        debouncer.record(PathBuf::from("/site/a.css"), FsEventKind::Modified);
        advance(Duration::from_millis(80)).await;
        debouncer.record(PathBuf::from("/site/b.css"), FsEventKind::Modified);
        advance(Duration::from_millis(80)).await;

        // 160ms since the first event, but only 80ms since the last one
        assert!(debouncer.take_ready().is_none());

        advance(Duration::from_millis(20)).await;
        let batch = debouncer.take_ready().unwrap();
        assert_eq!(batch.paths.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_created_then_removed_still_yields_batch() {
        let mut debouncer = EventDebouncer::new(QUIET);
        let path = PathBuf::from("/site/.index.html.swp");

        debouncer.record(path.clone(), FsEventKind::Created);
        debouncer.record(path, FsEventKind::Removed);
        advance(QUIET).await;

        let batch = debouncer.take_ready().unwrap();
        assert!(batch.paths.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_counts() {
        let mut debouncer = EventDebouncer::new(QUIET);
        debouncer.record(PathBuf::from("/a"), FsEventKind::Created);
        debouncer.record(PathBuf::from("/a"), FsEventKind::Modified);
        debouncer.record(PathBuf::from("/b"), FsEventKind::Modified);
        debouncer.record(PathBuf::from("/c"), FsEventKind::Removed);
        advance(QUIET).await;

        assert_eq!(debouncer.take_ready().unwrap().counts(), (1, 1, 1));
    }

    #[test]
    fn test_coalesce_all_combinations() {
        use FsEventKind::{Created, Modified, Removed};

        assert_eq!(FsEventKind::coalesce(Created, Created), Some(Created));
        assert_eq!(FsEventKind::coalesce(Created, Modified), Some(Created));
        assert_eq!(FsEventKind::coalesce(Created, Removed), None);

        assert_eq!(FsEventKind::coalesce(Modified, Created), Some(Created));
        assert_eq!(FsEventKind::coalesce(Modified, Modified), Some(Modified));
        assert_eq!(FsEventKind::coalesce(Modified, Removed), Some(Removed));

        assert_eq!(FsEventKind::coalesce(Removed, Created), Some(Modified));
        assert_eq!(FsEventKind::coalesce(Removed, Modified), Some(Removed));
        assert_eq!(FsEventKind::coalesce(Removed, Removed), Some(Removed));
    }

    #[test]
    fn test_from_notify() {
        use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind, RenameMode};

        assert_eq!(
            FsEventKind::from_notify(EventKind::Create(CreateKind::File)),
            Some(FsEventKind::Created)
        );
        assert_eq!(
            FsEventKind::from_notify(EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(FsEventKind::Modified)
        );
        assert_eq!(
            FsEventKind::from_notify(EventKind::Remove(RemoveKind::File)),
            Some(FsEventKind::Removed)
        );
        assert_eq!(
            FsEventKind::from_notify(EventKind::Access(AccessKind::Read)),
            None
        );
    }
}
