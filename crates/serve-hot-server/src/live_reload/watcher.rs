//! File watching.
//!
//! Observes the served root recursively and advances the broadcaster once per
//! debounced burst of changes. Watch errors are retried a bounded number of
//! times; past that the watcher returns a fatal error and the server shuts
//! down.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use glob::Pattern;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::broadcaster::Broadcaster;
use super::debouncer::{EventDebouncer, FsEventKind};

/// Capacity of the channel between the notify callback and the watcher task.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Watcher failure.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The initial watch could not be established.
    #[error("cannot watch {}: {source}", path.display())]
    Init {
        /// Directory that was to be watched.
        path: PathBuf,
        /// Underlying notify error.
        source: notify::Error,
    },
    /// Too many consecutive failures.
    #[error("giving up after {failures} consecutive failures: {source}")]
    Fatal {
        /// Consecutive failures observed.
        failures: u32,
        /// The last error.
        source: notify::Error,
    },
    /// The event source went away.
    #[error("event channel closed")]
    Disconnected,
}

/// Watcher tuning.
#[derive(Clone, Debug)]
pub(crate) struct WatchSettings {
    /// Quiet window before a burst counts as one change.
    pub(crate) debounce: Duration,
    /// Consecutive failures tolerated; one more is fatal.
    pub(crate) max_failures: u32,
    /// Pause before re-establishing the watch after a failure.
    pub(crate) retry_delay: Duration,
    /// Root-relative glob patterns to ignore.
    pub(crate) ignore_patterns: Vec<Pattern>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            max_failures: 3,
            retry_delay: Duration::from_millis(250),
            ignore_patterns: Vec::new(),
        }
    }
}

/// Consecutive failure counter.
#[derive(Debug)]
struct WatcherHealth {
    failures: u32,
    threshold: u32,
}

impl WatcherHealth {
    fn new(threshold: u32) -> Self {
        Self {
            failures: 0,
            threshold,
        }
    }

    /// Count a failure; returns the new consecutive count.
    fn record_failure(&mut self) -> u32 {
        self.failures += 1;
        self.failures
    }

    fn record_success(&mut self) {
        self.failures = 0;
    }

    fn is_exhausted(&self) -> bool {
        self.failures > self.threshold
    }
}

/// Something that can (re-)establish the filesystem watch.
pub(crate) trait WatchBackend: Send + 'static {
    /// Drop the current watch and start a fresh one.
    fn restart(&mut self) -> notify::Result<()>;
}

/// The platform's recommended notify watcher on a single root.
struct NotifyBackend {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl WatchBackend for NotifyBackend {
    fn restart(&mut self) -> notify::Result<()> {
        // The old watch may already be gone; only the new one matters
        let _ = self.watcher.unwatch(&self.root);
        self.watcher.watch(&self.root, RecursiveMode::Recursive)
    }
}

/// Start watching `root` in a background task.
///
/// The task ends with `Ok(())` once `shutdown` turns true, releasing the OS
/// watcher, or with an error if watching fails for good.
///
/// # Errors
///
/// Returns [`WatchError::Init`] if the initial watch cannot be established.
pub(crate) fn spawn_watcher(
    root: &Path,
    broadcaster: Arc<Broadcaster>,
    settings: WatchSettings,
    shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<Result<(), WatchError>>, WatchError> {
    let (tx, rx) = mpsc::channel::<notify::Result<Event>>(EVENT_CHANNEL_CAPACITY);
    let init_error = |source| WatchError::Init {
        path: root.to_path_buf(),
        source,
    };

    // Callback runs on notify's own thread, so blocking_send is fine
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.blocking_send(res);
    })
    .map_err(init_error)?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(init_error)?;

    tracing::info!(root = %root.display(), "Watching for changes");

    let backend = NotifyBackend {
        watcher,
        root: root.to_path_buf(),
    };
    let task = WatchTask::new(root, backend, rx, broadcaster, settings, shutdown);
    Ok(tokio::spawn(task.run()))
}

/// The watcher loop: receive, debounce, advance.
pub(crate) struct WatchTask<B> {
    root: PathBuf,
    backend: B,
    events: mpsc::Receiver<notify::Result<Event>>,
    broadcaster: Arc<Broadcaster>,
    debouncer: EventDebouncer,
    health: WatcherHealth,
    retry_delay: Duration,
    ignore_patterns: Vec<Pattern>,
    shutdown: watch::Receiver<bool>,
}

impl<B: WatchBackend> WatchTask<B> {
    pub(crate) fn new(
        root: &Path,
        backend: B,
        events: mpsc::Receiver<notify::Result<Event>>,
        broadcaster: Arc<Broadcaster>,
        settings: WatchSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            backend,
            events,
            broadcaster,
            debouncer: EventDebouncer::new(settings.debounce),
            health: WatcherHealth::new(settings.max_failures),
            retry_delay: settings.retry_delay,
            ignore_patterns: settings.ignore_patterns,
            shutdown,
        }
    }

    /// Run until shutdown or a fatal error.
    pub(crate) async fn run(mut self) -> Result<(), WatchError> {
        loop {
            let deadline = self.debouncer.next_deadline();

            tokio::select! {
                () = stopped(&mut self.shutdown) => break,
                received = self.events.recv() => match received {
                    Some(Ok(event)) => {
                        self.health.record_success();
                        self.record(event);
                    }
                    Some(Err(error)) => {
                        if self.recover(error).await? == Recovery::ShuttingDown {
                            break;
                        }
                    }
                    None => return Err(WatchError::Disconnected),
                },
                () = sleep_until(deadline), if deadline.is_some() => self.flush(),
            }
        }

        tracing::info!(root = %self.root.display(), "File watcher stopped");
        Ok(())
    }

    /// Feed a raw event into the debouncer.
    fn record(&mut self, event: Event) {
        let Some(kind) = FsEventKind::from_notify(event.kind) else {
            return;
        };

        for path in event.paths {
            if self.is_ignored(&path) {
                continue;
            }
            tracing::debug!(path = %path.display(), ?kind, "Recorded filesystem event");
            self.debouncer.record(path, kind);
        }
    }

    /// Advance the version if the pending batch has gone quiet.
    fn flush(&mut self) {
        let Some(batch) = self.debouncer.take_ready() else {
            return;
        };

        let version = self.broadcaster.advance();
        let (created, modified, removed) = batch.counts();
        tracing::info!(
            version,
            created,
            modified,
            removed,
            waiters = self.broadcaster.waiter_count(),
            "Change detected"
        );
    }

    /// Handle a watch error: count it, pause, and re-establish the watch.
    ///
    /// Shutdown interrupts the pause.
    async fn recover(&mut self, mut error: notify::Error) -> Result<Recovery, WatchError> {
        loop {
            let failures = self.health.record_failure();
            if self.health.is_exhausted() {
                tracing::error!(failures, error = %error, "File watcher failed permanently");
                return Err(WatchError::Fatal {
                    failures,
                    source: error,
                });
            }

            tracing::warn!(failures, error = %error, "File watcher error, retrying");
            tokio::select! {
                () = stopped(&mut self.shutdown) => return Ok(Recovery::ShuttingDown),
                () = tokio::time::sleep(self.retry_delay) => {}
            }

            match self.backend.restart() {
                Ok(()) => return Ok(Recovery::Restarted),
                Err(e) => error = e,
            }
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        if self.ignore_patterns.is_empty() {
            return false;
        }
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative))
    }
}

/// Outcome of [`WatchTask::recover`].
#[derive(Debug, PartialEq, Eq)]
enum Recovery {
    Restarted,
    ShuttingDown,
}

/// Resolve once shutdown is requested or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Sleep until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
