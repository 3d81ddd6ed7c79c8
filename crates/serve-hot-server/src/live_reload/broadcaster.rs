//! Change version broadcasting.
//!
//! Sessions wait for the version to move past the value they saw when they
//! connected. Backed by `tokio::sync::watch`, so every waiter is woken by a
//! single update and a dropped wait leaves nothing registered.

use tokio::sync::watch;

/// Shared change version with broadcast wake-up.
///
/// Written only by the file watcher; read by every reload session.
#[derive(Debug)]
pub struct Broadcaster {
    version: watch::Sender<u64>,
    closed: watch::Sender<bool>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    /// Create a broadcaster at version 0.
    #[must_use]
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        let (closed, _) = watch::channel(false);
        Self { version, closed }
    }

    /// Latest change version.
    #[must_use]
    pub fn current_version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Wait until the version is greater than `seen`.
    ///
    /// Returns the new version, or `None` once the broadcaster is closed.
    /// Dropping the returned future cancels the wait.
    pub async fn wait_for_change_since(&self, seen: u64) -> Option<u64> {
        let mut version = self.version.subscribe();
        let mut closed = self.closed.subscribe();

        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => None,
            changed = version.wait_for(|version| *version > seen) => changed.ok().map(|v| *v),
        }
    }

    /// Advance the version by one and wake all waiters.
    pub fn advance(&self) -> u64 {
        let mut next = 0;
        self.version.send_modify(|version| {
            *version += 1;
            next = *version;
        });
        next
    }

    /// Release every waiter without a new version.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Number of waits currently in progress.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.version.receiver_count()
    }
}
