//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::Arc;

use crate::live_reload::{Broadcaster, SessionTracker};
use crate::resolve::ServedRoot;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Canonical directory being served.
    pub(crate) root: ServedRoot,
    /// Change version shared with the file watcher.
    pub(crate) broadcaster: Arc<Broadcaster>,
    /// Reload sessions still running.
    pub(crate) sessions: Arc<SessionTracker>,
}
