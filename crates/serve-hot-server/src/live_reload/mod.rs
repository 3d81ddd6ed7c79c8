//! Live reload.
//!
//! The file watcher observes the served root and advances the
//! [`Broadcaster`] version once per debounced burst of changes. Each browser
//! holds a WebSocket to [`RELOAD_ENDPOINT`] whose session waits on the
//! broadcaster and sends a single [`RELOAD_MESSAGE`] before closing.

mod broadcaster;
mod debouncer;
mod session;
mod tracker;
mod watcher;
mod websocket;

pub use broadcaster::Broadcaster;
pub(crate) use tracker::SessionTracker;
pub(crate) use watcher::{WatchSettings, spawn_watcher};
pub use watcher::WatchError;
pub(crate) use websocket::reload_handler;

/// Path of the WebSocket endpoint the bootstrap script connects to.
pub const RELOAD_ENDPOINT: &str = "/reload-endpoint";

/// WebSocket subprotocol requested by the bootstrap script.
pub(crate) const SUBPROTOCOL: &str = "serve_hot";

/// The only message ever sent on the push channel.
pub(crate) const RELOAD_MESSAGE: &str = "reload";
