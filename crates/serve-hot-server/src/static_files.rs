//! Static file serving.
//!
//! Serves files below the root, redirecting directory requests that lack a
//! trailing slash so relative links in their index resolve correctly.

use std::sync::Arc;

use axum::extract::State;
use axum::http::Uri;
use axum::response::{IntoResponse, Redirect, Response};
use percent_encoding::percent_decode_str;

use crate::content;
use crate::error::ServeError;
use crate::resolve::Resolved;
use crate::state::AppState;

/// Serve the file a GET request names.
pub(crate) async fn serve_static(
    State(state): State<Arc<AppState>>,
    uri: Uri,
) -> Result<Response, ServeError> {
    let raw_path = uri.path();
    let decoded = percent_decode_str(raw_path)
        .decode_utf8()
        .map_err(|_| ServeError::MissingResource(raw_path.to_owned()))?
        .into_owned();
    if decoded.contains('\0') {
        return Err(ServeError::MissingResource(raw_path.to_owned()));
    }

    // Resolution does blocking filesystem calls
    let root = state.root.clone();
    let resolved = tokio::task::spawn_blocking(move || root.resolve(&decoded))
        .await
        .map_err(|e| ServeError::Io(std::io::Error::other(e)))??;

    match resolved {
        Resolved::File(file) => content::file_response(&file).await,
        Resolved::RedirectToDirectory => {
            let location = match uri.query() {
                Some(query) => format!("{raw_path}/?{query}"),
                None => format!("{raw_path}/"),
            };
            tracing::debug!(%location, "Redirecting to directory");
            Ok(Redirect::permanent(&location).into_response())
        }
    }
}
