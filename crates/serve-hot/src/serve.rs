//! Command line arguments and the serve command.

use std::path::PathBuf;

use clap::Parser;
use serve_hot_config::{CliSettings, Config};
use serve_hot_server::{Server, ServerConfig, shutdown_signal};

use crate::error::CliError;
use crate::output::Output;

/// Serve a directory and reload open pages when its files change.
#[derive(Debug, Parser)]
#[command(name = "serve-hot", version, about)]
pub(crate) struct ServeArgs {
    /// Directory to serve.
    #[arg(value_parser = existing_dir)]
    root: PathBuf,

    /// Path to configuration file (default: auto-discover serve-hot.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Quiet window in milliseconds before a burst of changes reloads (overrides config).
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Accept only paths naming an existing directory.
fn existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else if path.exists() {
        Err(format!("{value} is not a directory"))
    } else {
        Err(format!("{value} does not exist"))
    }
}

impl ServeArgs {
    /// Load configuration and serve until interrupted.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the server fails to start or
    /// the file watcher fails for good.
    pub(crate) async fn execute(self, output: &Output) -> Result<(), CliError> {
        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            debounce_ms: self.debounce_ms,
        };

        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::debug!(path = %path.display(), "Loaded configuration");
        }

        let server = Server::bind(server_config(&config, self.root)).await?;
        let address = server.local_addr()?;

        output.banner(
            address,
            server.root().path(),
            config.live_reload.debounce_ms,
        );

        server.run(shutdown_signal()).await?;

        output.stopped();
        Ok(())
    }
}

/// Build the server configuration from loaded config and the root argument.
fn server_config(config: &Config, root: PathBuf) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root,
        debounce: config.live_reload.debounce(),
        max_failures: config.live_reload.max_failures,
        retry_delay: config.live_reload.retry_delay(),
        ignore_patterns: config.live_reload.ignore_patterns.clone(),
        shutdown_timeout: config.server.shutdown_timeout(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_valid() {
        ServeArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_all_overrides() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_str().unwrap();

        let args = ServeArgs::try_parse_from([
            "serve-hot",
            root,
            "--host",
            "0.0.0.0",
            "-p",
            "3000",
            "--debounce-ms",
            "250",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.root, dir.path());
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(3000));
        assert_eq!(args.debounce_ms, Some(250));
        assert!(args.verbose);
    }

    #[test]
    fn test_root_is_required() {
        assert!(ServeArgs::try_parse_from(["serve-hot"]).is_err());
    }

    #[test]
    fn test_missing_root_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");

        let err = ServeArgs::try_parse_from(["serve-hot", missing.to_str().unwrap()]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_file_root_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("index.html");
        std::fs::write(&file, "<html></html>").unwrap();

        let err = ServeArgs::try_parse_from(["serve-hot", file.to_str().unwrap()]).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn test_server_config_from_config() {
        let mut config = Config::default();
        config.server.port = 9000;
        config.live_reload.debounce_ms = 40;
        config.live_reload.ignore_patterns = vec!["*.tmp".to_owned()];

        let server = server_config(&config, PathBuf::from("public"));

        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 9000);
        assert_eq!(server.root, PathBuf::from("public"));
        assert_eq!(server.debounce, Duration::from_millis(40));
        assert_eq!(server.max_failures, 3);
        assert_eq!(server.retry_delay, Duration::from_millis(250));
        assert_eq!(server.ignore_patterns, vec!["*.tmp".to_owned()]);
        assert_eq!(server.shutdown_timeout, Duration::from_secs(5));
    }
}
