//! Startup and exit messages on stderr.

use std::net::SocketAddr;
use std::path::Path;

use console::{Style, Term};

use crate::error::CliError;

/// Human-facing status lines, separate from the tracing log.
pub(crate) struct Output {
    term: Term,
    url: Style,
    done: Style,
    failed: Style,
}

impl Output {
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            url: Style::new().cyan().bold(),
            done: Style::new().green(),
            failed: Style::new().red(),
        }
    }

    /// Print where the server listens, what it serves and how it reloads.
    pub(crate) fn banner(&self, address: SocketAddr, root: &Path, debounce_ms: u64) {
        let [url, root, reload] = banner_lines(address, root, debounce_ms);
        self.write(&self.url.apply_to(url).to_string());
        self.write(&root);
        self.write(&reload);
    }

    /// Print the clean shutdown line.
    pub(crate) fn stopped(&self) {
        self.write(&self.done.apply_to("Server stopped").to_string());
    }

    /// Print a fatal error with its exit status.
    pub(crate) fn failure(&self, err: &CliError) {
        let line = failure_line(err);
        self.write(&self.failed.apply_to(line).to_string());
    }

    fn write(&self, line: &str) {
        // Nowhere left to report a broken stderr
        let _ = self.term.write_line(line);
    }
}

fn banner_lines(address: SocketAddr, root: &Path, debounce_ms: u64) -> [String; 3] {
    [
        format!("Serving at http://{address}/"),
        format!("Root: {}", root.display()),
        format!("Live reload: {debounce_ms} ms debounce"),
    ]
}

fn failure_line(err: &CliError) -> String {
    format!("Error: {err} (exit {})", err.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serve_hot_server::ServerError;

    #[test]
    fn test_banner_lines() {
        let address: SocketAddr = "127.0.0.1:8080".parse().unwrap();

        let lines = banner_lines(address, Path::new("/srv/site"), 100);

        assert_eq!(
            lines,
            [
                "Serving at http://127.0.0.1:8080/".to_owned(),
                "Root: /srv/site".to_owned(),
                "Live reload: 100 ms debounce".to_owned(),
            ]
        );
    }

    #[test]
    fn test_failure_line_includes_exit_code() {
        let err = CliError::Server(ServerError::WatcherStopped);
        assert_eq!(
            failure_line(&err),
            "Error: file watcher stopped unexpectedly (exit 1)"
        );
    }
}
