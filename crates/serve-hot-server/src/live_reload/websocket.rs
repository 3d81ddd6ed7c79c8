//! WebSocket handler for live reload.
//!
//! Upgrades requests on the reload endpoint and hands the socket to a
//! [`ReloadSession`].

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};

use super::SUBPROTOCOL;
use super::session::{ChannelClosed, Inbound, PushChannel, ReloadSession};
use crate::error::ServeError;
use crate::state::AppState;

/// Handle a request on the reload endpoint.
///
/// Plain HTTP requests are refused with 403.
pub(crate) async fn reload_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ServeError> {
    let upgrade = upgrade.map_err(|_| ServeError::UpgradeRequired)?;

    // Version seen at request time; a change landing before the upgrade
    // completes is still delivered.
    let mut session = ReloadSession::connect(state.broadcaster.current_version());
    let guard = state.sessions.enter();

    Ok(upgrade
        .protocols([SUBPROTOCOL])
        .on_upgrade(move |socket| async move {
            tracing::debug!("Reload session opened");
            let reason = session.run(socket, &state.broadcaster).await;
            tracing::debug!(?reason, state = ?session.state(), "Reload session closed");
            drop(guard);
        })
        .into_response())
}

impl PushChannel for WebSocket {
    async fn send_text(&mut self, text: &'static str) -> Result<(), ChannelClosed> {
        self.send(Message::Text(Utf8Bytes::from_static(text)))
            .await
            .map_err(|_| ChannelClosed)
    }

    async fn recv(&mut self) -> Inbound {
        match WebSocket::recv(self).await {
            Some(Ok(Message::Close(_)) | Err(_)) | None => Inbound::Closed,
            Some(Ok(_)) => Inbound::Message,
        }
    }

    async fn close(mut self) {
        // Client may already be gone
        let _ = self.send(Message::Close(None)).await;
    }
}
