//! Open session accounting.
//!
//! Upgraded connections leave axum's graceful shutdown, so the server waits
//! on this tracker to let sessions send their Close frame before it returns.

use tokio::sync::watch;

/// Counts reload sessions that are still running.
#[derive(Debug)]
pub(crate) struct SessionTracker {
    open: watch::Sender<usize>,
}

impl SessionTracker {
    pub(crate) fn new() -> Self {
        let (open, _) = watch::channel(0);
        Self { open }
    }

    /// Register a session. It counts as open until the guard is dropped.
    pub(crate) fn enter(&self) -> SessionGuard {
        self.open.send_modify(|open| *open += 1);
        SessionGuard {
            open: self.open.clone(),
        }
    }

    /// Number of sessions still open.
    pub(crate) fn open_count(&self) -> usize {
        *self.open.borrow()
    }

    /// Wait until every session has ended.
    pub(crate) async fn wait_idle(&self) {
        let mut open = self.open.subscribe();
        let _ = open.wait_for(|open| *open == 0).await;
    }
}

/// Keeps one session counted while alive.
#[derive(Debug)]
pub(crate) struct SessionGuard {
    open: watch::Sender<usize>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.open.send_modify(|open| *open -= 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_idle_without_sessions() {
        let tracker = SessionTracker::new();
        assert_eq!(tracker.open_count(), 0);
        tokio::time::timeout(Duration::from_millis(50), tracker.wait_idle())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_guards_count_sessions() {
        let tracker = SessionTracker::new();
        let first = tracker.enter();
        let second = tracker.enter();
        assert_eq!(tracker.open_count(), 2);

        drop(first);
        assert_eq!(tracker.open_count(), 1);
        drop(second);
        assert_eq!(tracker.open_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_blocks_until_last_guard_drops() {
        let tracker = Arc::new(SessionTracker::new());
        let guard = tracker.enter();

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
