//! CLI error types.

use serve_hot_config::ConfigError;
use serve_hot_server::ServerError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Server(#[from] ServerError),
}

impl CliError {
    /// Process exit status.
    pub(crate) fn exit_code(&self) -> u8 {
        match self {
            Self::Server(err) => err.exit_code(),
            Self::Config(_) | Self::Io(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_every_error_exits_non_zero() {
        let errors = [
            CliError::Config(ConfigError::NotFound(PathBuf::from("serve-hot.toml"))),
            CliError::Io(std::io::Error::other("runtime")),
            CliError::Server(ServerError::WatcherStopped),
        ];
        for err in errors {
            assert_ne!(err.exit_code(), 0, "{err}");
        }
    }
}
