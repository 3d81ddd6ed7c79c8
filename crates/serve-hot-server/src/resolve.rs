//! Request path resolution.
//!
//! Maps URL paths onto files below the served root. Every resolved path is
//! checked against the canonical root so neither `..` segments nor symlinks
//! can reach files outside it.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{ServeError, ServerError};

/// File served for directory requests.
const INDEX_FILE: &str = "index.html";

/// Content type for extensions missing from [`CONTENT_TYPES`].
pub(crate) const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type of HTML documents, the only ones that get the bootstrap script.
pub(crate) const HTML_CONTENT_TYPE: &str = "text/html";

/// Extension to MIME type table. Extensions are matched case-insensitively.
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("gif", "image/gif"),
    ("html", HTML_CONTENT_TYPE),
    ("ico", "image/x-icon"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
];

/// Look up the content type for a path by its extension.
pub(crate) fn content_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return DEFAULT_CONTENT_TYPE;
    };
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map_or(DEFAULT_CONTENT_TYPE, |&(_, mime)| mime)
}

/// A regular file below the served root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedFile {
    /// Canonical filesystem path.
    pub(crate) path: PathBuf,
    /// MIME type derived from the extension.
    pub(crate) content_type: &'static str,
}

impl ResolvedFile {
    /// Whether the file gets the bootstrap script injected.
    pub(crate) fn is_html(&self) -> bool {
        self.content_type == HTML_CONTENT_TYPE
    }
}

/// Successful resolution outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Resolved {
    /// Serve this file.
    File(ResolvedFile),
    /// A directory with an index was requested without its trailing slash.
    RedirectToDirectory,
}

/// The directory all content is served from.
///
/// Canonicalized once at startup and never changed afterwards.
#[derive(Clone, Debug)]
pub struct ServedRoot {
    path: PathBuf,
}

impl ServedRoot {
    /// Validate and canonicalize the root directory.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRootDirectory`] if the path does not exist
    /// or is not a directory.
    pub fn new(path: &Path) -> Result<Self, ServerError> {
        let invalid = |reason: String| ServerError::InvalidRootDirectory {
            path: path.to_path_buf(),
            reason,
        };

        let canonical = path.canonicalize().map_err(|e| invalid(e.to_string()))?;
        if !canonical.is_dir() {
            return Err(invalid("not a directory".to_owned()));
        }

        Ok(Self { path: canonical })
    }

    /// Canonical root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a decoded URL path to a resource below the root.
    ///
    /// A single leading `/` is stripped before joining. Directories resolve to
    /// their `index.html`.
    pub(crate) fn resolve(&self, request_path: &str) -> Result<Resolved, ServeError> {
        let relative = request_path.strip_prefix('/').unwrap_or(request_path);
        let joined = self.join_lexically(relative)?;
        let canonical = self.canonicalize_within(&joined, request_path)?;

        if canonical.is_dir() {
            let index = canonical.join(INDEX_FILE);
            let wants_redirect = !relative.is_empty() && !relative.ends_with('/');
            if wants_redirect && index.is_file() {
                return Ok(Resolved::RedirectToDirectory);
            }
            let canonical_index = self.canonicalize_within(&index, request_path)?;
            return Self::regular_file(canonical_index, request_path).map(Resolved::File);
        }

        Self::regular_file(canonical, request_path).map(Resolved::File)
    }

    /// Join `relative` onto the root without touching the filesystem.
    ///
    /// Rejects `..` segments that climb above the root and absolute components.
    fn join_lexically(&self, relative: &str) -> Result<PathBuf, ServeError> {
        let mut joined = self.path.clone();
        let mut depth = 0usize;

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(segment) => {
                    joined.push(segment);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir if depth > 0 => {
                    joined.pop();
                    depth -= 1;
                }
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ServeError::SandboxViolation(relative.to_owned()));
                }
            }
        }

        Ok(joined)
    }

    /// Canonicalize `path` and check it is still below the root.
    fn canonicalize_within(&self, path: &Path, request_path: &str) -> Result<PathBuf, ServeError> {
        let canonical = path.canonicalize().map_err(|e| match e.kind() {
            // InvalidInput covers names the OS cannot represent, such as a NUL byte
            io::ErrorKind::NotFound
            | io::ErrorKind::NotADirectory
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::InvalidFilename => {
                ServeError::MissingResource(request_path.to_owned())
            }
            _ => ServeError::Io(e),
        })?;

        if !canonical.starts_with(&self.path) {
            return Err(ServeError::SandboxViolation(request_path.to_owned()));
        }
        Ok(canonical)
    }

    fn regular_file(path: PathBuf, request_path: &str) -> Result<ResolvedFile, ServeError> {
        if !path.is_file() {
            return Err(ServeError::NotAFile(request_path.to_owned()));
        }
        let content_type = content_type_for(&path);
        Ok(ResolvedFile { path, content_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn site() -> (tempfile::TempDir, ServedRoot) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/index.html"), "<p>docs</p>").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        let root = ServedRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    fn expect_file(resolved: Result<Resolved, ServeError>) -> ResolvedFile {
        match resolved {
            Ok(Resolved::File(file)) => file,
            other => panic!("expected file, got {other:?}"),
        }
    }

    #[test]
    fn test_root_resolves_to_index() {
        let (_dir, root) = site();
        let file = expect_file(root.resolve("/"));
        assert_eq!(file.path, root.path().join("index.html"));
        assert_eq!(file.content_type, "text/html");
        assert!(file.is_html());
    }

    #[test]
    fn test_plain_file() {
        let (_dir, root) = site();
        let file = expect_file(root.resolve("/app.js"));
        assert_eq!(file.path, root.path().join("app.js"));
        assert_eq!(file.content_type, "text/javascript");
        assert!(!file.is_html());
    }

    #[test]
    fn test_directory_with_slash_serves_index() {
        let (_dir, root) = site();
        let file = expect_file(root.resolve("/docs/"));
        assert_eq!(file.path, root.path().join("docs/index.html"));
    }

    #[test]
    fn test_directory_without_slash_redirects() {
        let (_dir, root) = site();
        assert_eq!(
            root.resolve("/docs").unwrap(),
            Resolved::RedirectToDirectory
        );
    }

    #[test]
    fn test_directory_without_index_is_not_found() {
        let (_dir, root) = site();
        assert!(matches!(
            root.resolve("/empty/"),
            Err(ServeError::MissingResource(_))
        ));
        assert!(matches!(
            root.resolve("/empty"),
            Err(ServeError::MissingResource(_))
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let (_dir, root) = site();
        assert!(matches!(
            root.resolve("/nope.css"),
            Err(ServeError::MissingResource(_))
        ));
    }

    #[test]
    fn test_nul_byte_is_not_found() {
        let (_dir, root) = site();
        for path in ["/\0", "/index.html\0", "/a\0b/"] {
            assert!(
                matches!(root.resolve(path), Err(ServeError::MissingResource(_))),
                "{path:?}"
            );
        }
    }

    #[test]
    fn test_file_used_as_directory_is_not_found() {
        let (_dir, root) = site();
        assert!(matches!(
            root.resolve("/app.js/more"),
            Err(ServeError::MissingResource(_))
        ));
    }

    #[test]
    fn test_parent_traversal_is_forbidden() {
        let (_dir, root) = site();
        for path in ["/../../etc/passwd", "/docs/../../secret", "/..", "/../"] {
            assert!(
                matches!(root.resolve(path), Err(ServeError::SandboxViolation(_))),
                "{path} should be forbidden"
            );
        }
    }

    #[test]
    fn test_absolute_component_is_forbidden() {
        let (_dir, root) = site();
        assert!(matches!(
            root.resolve("//etc/passwd"),
            Err(ServeError::SandboxViolation(_))
        ));
    }

    #[test]
    fn test_parent_within_root_is_allowed() {
        let (_dir, root) = site();
        let file = expect_file(root.resolve("/docs/../app.js"));
        assert_eq!(file.path, root.path().join("app.js"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_forbidden() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        let (dir, root) = site();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(matches!(
            root.resolve("/link/secret.txt"),
            Err(ServeError::SandboxViolation(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_special_file_is_not_a_file() {
        let (dir, root) = site();
        // A directory named index.html is neither missing nor a regular file.
        fs::create_dir(dir.path().join("odd")).unwrap();
        fs::create_dir(dir.path().join("odd/index.html")).unwrap();

        assert!(matches!(
            root.resolve("/odd/"),
            Err(ServeError::NotAFile(_))
        ));
    }

    #[test]
    fn test_served_root_rejects_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServedRoot::new(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, ServerError::InvalidRootDirectory { .. }));
    }

    #[test]
    fn test_served_root_rejects_file() {
        let (dir, _root) = site();
        let err = ServedRoot::new(&dir.path().join("app.js")).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_content_type_table() {
        let cases = [
            ("a.html", "text/html"),
            ("a.css", "text/css"),
            ("a.js", "text/javascript"),
            ("a.json", "application/json"),
            ("a.png", "image/png"),
            ("a.jpg", "image/jpeg"),
            ("a.jpeg", "image/jpeg"),
            ("a.gif", "image/gif"),
            ("a.ico", "image/x-icon"),
            ("a.svg", "image/svg+xml"),
            ("a.webp", "image/webp"),
            ("A.PNG", "image/png"),
            ("a.wasm", "application/octet-stream"),
            ("Makefile", "application/octet-stream"),
        ];
        for (path, expected) in cases {
            assert_eq!(content_type_for(Path::new(path)), expected, "{path}");
        }
    }
}
