//! Cache suppression middleware.
//!
//! Every response carries headers telling the browser not to cache it, so a
//! reload always fetches the current file:
//! - Cache-Control
//! - Pragma
//! - Expires

use axum::http::HeaderValue;
use axum::http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use tower_http::set_header::SetResponseHeaderLayer;

/// Cache-Control header value.
pub(crate) const CACHE_CONTROL_VALUE: &str = "no-cache, no-store, must-revalidate";

/// Create layer that adds Cache-Control header.
pub(crate) fn cache_control_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL_VALUE),
    )
}

/// Create layer that adds Pragma header for HTTP/1.0 caches.
pub(crate) fn pragma_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(PRAGMA, HeaderValue::from_static("no-cache"))
}

/// Create layer that adds an already expired Expires header.
pub(crate) fn expires_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(EXPIRES, HeaderValue::from_static("0"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_control_value() {
        assert!(CACHE_CONTROL_VALUE.contains("no-cache"));
        assert!(CACHE_CONTROL_VALUE.contains("no-store"));
        assert!(CACHE_CONTROL_VALUE.contains("must-revalidate"));
    }
}
