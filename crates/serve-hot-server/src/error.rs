//! Error types.
//!
//! [`ServeError`] covers a single request and converts into an HTTP response.
//! [`ServerError`] is fatal and ends the process.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::live_reload::WatchError;

/// Request-level error, rendered as an HTTP error response.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ServeError {
    /// The path points outside the served root.
    #[error("path escapes the served root: {0}")]
    SandboxViolation(String),
    /// The path exists but is not a regular file.
    #[error("not a file: {0}")]
    NotAFile(String),
    /// Nothing exists at the path.
    #[error("not found: {0}")]
    MissingResource(String),
    /// The reload endpoint was requested without a WebSocket upgrade.
    #[error("reload endpoint requires a WebSocket upgrade")]
    UpgradeRequired,
    /// Reading a resolved file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServeError {
    /// HTTP status for this error.
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            Self::SandboxViolation(_) | Self::NotAFile(_) | Self::UpgradeRequired => {
                StatusCode::FORBIDDEN
            }
            Self::MissingResource(_) => StatusCode::NOT_FOUND,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        match &self {
            Self::SandboxViolation(path) => tracing::warn!(%path, "Path not in root"),
            Self::NotAFile(path) => tracing::info!(%path, "Not a file"),
            Self::MissingResource(path) => tracing::debug!(%path, "File not found"),
            Self::UpgradeRequired => tracing::debug!("Reload endpoint requested without upgrade"),
            Self::Io(e) => tracing::error!(error = %e, "Failed to read file"),
        }

        let status = self.status_code();
        let body = match self {
            Self::SandboxViolation(_) => "No, you may not look at my other files.",
            Self::NotAFile(_) | Self::UpgradeRequired => "Forbidden",
            Self::MissingResource(_) => "Not Found",
            Self::Io(_) => "Internal Server Error",
        };
        (status, body).into_response()
    }
}

/// Fatal server error.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The directory to serve is missing or not a directory.
    #[error("invalid root directory {}: {reason}", path.display())]
    InvalidRootDirectory {
        /// Path as given on the command line.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },
    /// An ignore pattern is not a valid glob.
    #[error("invalid ignore pattern {pattern:?}: {source}")]
    InvalidIgnorePattern {
        /// Pattern as configured.
        pattern: String,
        /// Underlying glob error.
        source: glob::PatternError,
    },
    /// Binding the listener failed.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address that was requested.
        address: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Serving connections failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The file watcher failed.
    #[error("file watcher failed: {0}")]
    Watcher(#[from] WatchError),
    /// The file watcher task panicked.
    #[error("file watcher panicked: {0}")]
    WatcherPanicked(String),
    /// The file watcher stopped while the server was still running.
    #[error("file watcher stopped unexpectedly")]
    WatcherStopped,
}

impl ServerError {
    /// Process exit status for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServeError::SandboxViolation("/..".to_owned()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServeError::NotAFile("/dev".to_owned()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServeError::MissingResource("/x".to_owned()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServeError::UpgradeRequired.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServeError::Io(std::io::Error::other("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = ServeError::MissingResource("/x".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_fatal_errors_exit_non_zero() {
        let err = ServerError::InvalidRootDirectory {
            path: PathBuf::from("/nope"),
            reason: "No such file or directory".to_owned(),
        };
        assert_ne!(err.exit_code(), 0);
        assert!(err.to_string().contains("/nope"));
        assert_ne!(ServerError::WatcherStopped.exit_code(), 0);
    }
}
