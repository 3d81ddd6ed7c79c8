//! Response bodies for resolved files.
//!
//! HTML documents get the live reload bootstrap script inserted right after
//! their first `<head>` tag. Everything else is served byte for byte.

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::Response;

use crate::error::ServeError;
use crate::resolve::ResolvedFile;

/// Client script opening the reload push channel, wrapped in a script tag.
pub(crate) const BOOTSTRAP_SCRIPT: &str = concat!(
    "<script>",
    include_str!("../assets/reload-client.js"),
    "</script>"
);

/// Injection point for [`BOOTSTRAP_SCRIPT`].
const HEAD_TAG: &[u8] = b"<head>";

/// Insert the bootstrap script after the first `<head>`.
///
/// Documents without a `<head>` tag are returned unchanged.
pub(crate) fn inject_bootstrap(mut html: Vec<u8>) -> Vec<u8> {
    let Some(start) = html
        .windows(HEAD_TAG.len())
        .position(|window| window == HEAD_TAG)
    else {
        return html;
    };

    let insert_at = start + HEAD_TAG.len();
    html.splice(insert_at..insert_at, BOOTSTRAP_SCRIPT.bytes());
    html
}

/// Read a resolved file and build its response.
pub(crate) async fn file_response(file: &ResolvedFile) -> Result<Response, ServeError> {
    let mut content = tokio::fs::read(&file.path).await?;
    if file.is_html() {
        content = inject_bootstrap(content);
    }

    tracing::debug!(
        path = %file.path.display(),
        content_type = file.content_type,
        bytes = content.len(),
        "Serving file"
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type)
        .body(Body::from(content))
        .map_err(|e| ServeError::Io(std::io::Error::other(e)))
}
