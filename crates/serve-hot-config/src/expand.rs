//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// `field` names the configuration key and is only used for error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.var_name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_literal_passes_through() {
        assert_eq!(expand_env("localhost", "server.host").unwrap(), "localhost");
    }

    #[test]
    fn test_default_used_when_unset() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("SERVE_HOT_EXPAND_UNSET");
        }
        let expanded = expand_env("${SERVE_HOT_EXPAND_UNSET:-0.0.0.0}", "server.host").unwrap();
        assert_eq!(expanded, "0.0.0.0");
    }

    #[test]
    fn test_missing_var_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("SERVE_HOT_EXPAND_MISSING");
        }
        let err = expand_env("${SERVE_HOT_EXPAND_MISSING}", "server.host").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("server.host"));
        assert!(msg.contains("SERVE_HOT_EXPAND_MISSING"));
    }
}
