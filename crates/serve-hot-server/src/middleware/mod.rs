//! HTTP middleware.

pub(crate) mod no_cache;
