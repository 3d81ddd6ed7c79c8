//! Reload session state machine.
//!
//! One session per upgraded connection:
//!
//! ```text
//! Connecting ──upgrade──► Upgraded ──change──► Notified ──► Closed
//!      │                     │
//!      └──no upgrade (403)───┴──client gone / shutdown──────► Closed
//! ```
//!
//! A session sends at most one message. Browsers reload on it and open a
//! fresh session from the reloaded page.

use std::future::Future;

use super::RELOAD_MESSAGE;
use super::broadcaster::Broadcaster;

/// Lifecycle state of a reload session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SessionState {
    Connecting,
    Upgraded,
    Notified,
    Closed,
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CloseReason {
    /// The reload message was delivered.
    Notified,
    /// The client closed the channel or it failed.
    Disconnected,
    /// The server is shutting down.
    ShuttingDown,
}

/// What the client sent.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// Any application or control message; ignored.
    Message,
    /// The channel closed or failed.
    Closed,
}

/// Send failed because the channel is gone.
#[derive(Debug)]
pub(crate) struct ChannelClosed;

/// Bidirectional push channel a session talks over.
pub(crate) trait PushChannel: Send {
    /// Send a text message to the client.
    fn send_text(
        &mut self,
        text: &'static str,
    ) -> impl Future<Output = Result<(), ChannelClosed>> + Send;

    /// Wait for the next thing the client sends.
    fn recv(&mut self) -> impl Future<Output = Inbound> + Send;

    /// Close the channel.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// How the wait on the broadcaster ended.
enum Wake {
    Changed(u64),
    ShuttingDown,
    Disconnected,
}

/// One client's reload session.
#[derive(Debug)]
pub(crate) struct ReloadSession {
    state: SessionState,
    seen_version: u64,
}

impl ReloadSession {
    /// Start a session at the version observed when the request arrived.
    pub(crate) fn connect(seen_version: u64) -> Self {
        Self {
            state: SessionState::Connecting,
            seen_version,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session over an upgraded channel until it closes.
    pub(crate) async fn run<C: PushChannel>(
        &mut self,
        mut channel: C,
        broadcaster: &Broadcaster,
    ) -> CloseReason {
        self.transition(SessionState::Upgraded);

        let wake = {
            let wait = broadcaster.wait_for_change_since(self.seen_version);
            tokio::pin!(wait);
            loop {
                tokio::select! {
                    changed = &mut wait => {
                        break changed.map_or(Wake::ShuttingDown, Wake::Changed);
                    }
                    inbound = channel.recv() => {
                        if inbound == Inbound::Closed {
                            break Wake::Disconnected;
                        }
                    }
                }
            }
        };

        let reason = match wake {
            Wake::Changed(version) => {
                self.transition(SessionState::Notified);
                if channel.send_text(RELOAD_MESSAGE).await.is_err() {
                    tracing::debug!(version, "Client left before reload was delivered");
                    self.transition(SessionState::Closed);
                    return CloseReason::Disconnected;
                }
                tracing::debug!(version, "Sent reload");
                CloseReason::Notified
            }
            Wake::ShuttingDown => CloseReason::ShuttingDown,
            Wake::Disconnected => {
                self.transition(SessionState::Closed);
                return CloseReason::Disconnected;
            }
        };

        channel.close().await;
        self.transition(SessionState::Closed);
        reason
    }

    fn transition(&mut self, next: SessionState) {
        tracing::trace!(from = ?self.state, to = ?next, seen_version = self.seen_version, "Session state");
        self.state = next;
    }
}
