//! HTTP server for serve-hot.
//!
//! Serves a directory of static files and pushes a reload to every open page
//! whenever something below that directory changes:
//! - Static files, confined to the served root
//! - HTML documents get a small bootstrap script injected after `<head>`
//! - WebSocket endpoint at [`RELOAD_ENDPOINT`] for the bootstrap script
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use serve_hot_server::{Server, ServerConfig, shutdown_signal};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         root: PathBuf::from("public"),
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::bind(config).await.unwrap();
//!     server.run(shutdown_signal()).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router (no-cache headers on every response)
//!    ▲                   │
//!    │                   ├─► /reload-endpoint ──► ReloadSession ◄──┐
//!    │                   │                                          │ wake
//!    │                   └─► static files ──► ServedRoot            │
//!    │                                                        Broadcaster
//!    └──── "reload" ◄── session                                     ▲
//!                                                                   │ advance
//!                                 notify ──► debouncer ──► watcher task
//! ```

mod app;
mod content;
mod error;
mod live_reload;
mod middleware;
mod resolve;
mod state;
mod static_files;

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use glob::Pattern;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

pub use error::ServerError;
pub use live_reload::{Broadcaster, RELOAD_ENDPOINT, WatchError};
pub use resolve::ServedRoot;
use live_reload::SessionTracker;
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on. `0` picks a free port.
    pub port: u16,
    /// Directory to serve.
    pub root: PathBuf,
    /// Quiet window before a burst of changes triggers a reload.
    pub debounce: Duration,
    /// Consecutive watcher failures tolerated before giving up.
    pub max_failures: u32,
    /// Pause before re-establishing a failed watch.
    pub retry_delay: Duration,
    /// Root-relative glob patterns whose changes are ignored.
    pub ignore_patterns: Vec<String>,
    /// Upper bound on waiting for connections and the watcher at shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let watch = live_reload::WatchSettings::default();
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            root: PathBuf::from("."),
            debounce: watch.debounce,
            max_failures: watch.max_failures,
            retry_delay: watch.retry_delay,
            ignore_patterns: Vec::new(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    fn watch_settings(&self) -> Result<live_reload::WatchSettings, ServerError> {
        let ignore_patterns = self
            .ignore_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|source| ServerError::InvalidIgnorePattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(live_reload::WatchSettings {
            debounce: self.debounce,
            max_failures: self.max_failures,
            retry_delay: self.retry_delay,
            ignore_patterns,
        })
    }
}

/// A bound server with its file watcher running.
pub struct Server {
    listener: TcpListener,
    router: Router,
    root: ServedRoot,
    broadcaster: Arc<Broadcaster>,
    sessions: Arc<SessionTracker>,
    watcher: JoinHandle<Result<(), WatchError>>,
    stop: watch::Sender<bool>,
    shutdown_timeout: Duration,
}

/// What ended the serving phase.
enum Stopped {
    Signal,
    Watcher(Result<Result<(), WatchError>, JoinError>),
    Serve(std::io::Result<()>),
}

impl Server {
    /// Validate the root, start the watcher and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a directory, the watch cannot be
    /// established or the address cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let root = ServedRoot::new(&config.root)?;
        let settings = config.watch_settings()?;
        let broadcaster = Arc::new(Broadcaster::new());
        let (stop, stop_rx) = watch::channel(false);

        let watcher = live_reload::spawn_watcher(
            root.path(),
            Arc::clone(&broadcaster),
            settings,
            stop_rx,
        )?;

        let address = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;

        let sessions = Arc::new(SessionTracker::new());
        let state = Arc::new(AppState {
            root: root.clone(),
            broadcaster: Arc::clone(&broadcaster),
            sessions: Arc::clone(&sessions),
        });

        Ok(Self {
            listener,
            router: app::create_router(state),
            root,
            broadcaster,
            sessions,
            watcher,
            stop,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be queried.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Canonical directory being served.
    #[must_use]
    pub fn root(&self) -> &ServedRoot {
        &self.root
    }

    /// Change version shared by the watcher and all sessions.
    #[must_use]
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Serve until `signal` resolves or the watcher fails.
    ///
    /// On the way out the watcher is stopped, open reload sessions are closed
    /// without a notification and outstanding connections get up to the
    /// configured shutdown timeout to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher fails or serving connections fails.
    pub async fn run(self, signal: impl Future<Output = ()>) -> Result<(), ServerError> {
        let Self {
            listener,
            router,
            broadcaster,
            sessions,
            mut watcher,
            stop,
            shutdown_timeout,
            ..
        } = self;

        if let Ok(address) = listener.local_addr() {
            tracing::info!(address = %address, "Starting server");
        }

        let mut stop_rx = stop.subscribe();
        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.wait_for(|stop| *stop).await;
            })
            .into_future();
        tokio::pin!(serve);
        tokio::pin!(signal);

        let stopped = tokio::select! {
            () = &mut signal => Stopped::Signal,
            joined = &mut watcher => Stopped::Watcher(joined),
            served = &mut serve => Stopped::Serve(served),
        };

        match &stopped {
            Stopped::Signal => tracing::info!("Shutdown signal received, stopping server..."),
            Stopped::Watcher(_) => tracing::info!("File watcher ended, stopping server..."),
            Stopped::Serve(Ok(())) => {}
            Stopped::Serve(Err(e)) => tracing::error!(error = %e, "Server failed"),
        }

        stop.send_replace(true);
        broadcaster.close();

        let drain = async {
            if !matches!(stopped, Stopped::Serve(_)) {
                if let Err(e) = (&mut serve).await {
                    tracing::warn!(error = %e, "Error while draining connections");
                }
            }
            // Upgraded connections are not part of the graceful drain above
            sessions.wait_idle().await;
            if !matches!(stopped, Stopped::Watcher(_)) {
                match (&mut watcher).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "Watcher failed during shutdown"),
                    Err(e) => tracing::warn!(error = %e, "Watcher panicked during shutdown"),
                }
            }
        };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            tracing::warn!(
                timeout_ms = shutdown_timeout.as_millis(),
                open_sessions = sessions.open_count(),
                "Shutdown timed out, dropping remaining connections"
            );
            watcher.abort();
        }

        match stopped {
            Stopped::Signal | Stopped::Serve(Ok(())) => Ok(()),
            Stopped::Watcher(joined) => Err(watcher_failure(joined)),
            Stopped::Serve(Err(e)) => Err(ServerError::Io(e)),
        }
    }
}

/// Map the end of the watcher task while the server was still running.
fn watcher_failure(joined: Result<Result<(), WatchError>, JoinError>) -> ServerError {
    match joined {
        Ok(Ok(())) => ServerError::WatcherStopped,
        Ok(Err(e)) => ServerError::Watcher(e),
        Err(e) => ServerError::WatcherPanicked(e.to_string()),
    }
}

/// Wait for shutdown signal (Ctrl-C, or SIGTERM on Unix).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
