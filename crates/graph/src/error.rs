//! Error types used throughout the integration

use thiserror::Error;

/// Main error type for the Graph integration
///
/// Only `Config` reaches callers, at construction time. Every other category
/// is absorbed inside the crate: surfaced as `None`/`false` results or as the
/// response envelope, and logged where it was absorbed.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Required configuration is missing or blank
    #[error("Configuration error: {0}")]
    Config(String),

    /// The identity provider rejected or failed a token request
    #[error("Token acquisition error: {0}")]
    Acquisition(String),

    /// A request that never produced an HTTP response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Graph answered with a non-success status
    #[error("Upstream error ({status}): {body}")]
    Upstream {
        /// HTTP status code returned by Graph
        status: u16,
        /// Response body, truncated for logging
        body: String,
    },

    /// A response body or URL did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type alias for Graph integration operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Describe a transport failure as `<kind>: <message>`
///
/// The kind labels the failure mode so log lines and the response envelope
/// stay greppable across reqwest versions.
#[must_use]
pub fn transport_detail(err: &reqwest::Error) -> String {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_body() || err.is_decode() {
        "body read failed"
    } else if err.is_request() {
        "request failed"
    } else {
        "transport failure"
    };
    format!("{}: {}", kind, err)
}

/// Truncate a response body for log output, keeping char boundaries intact
pub(crate) fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        None => text.to_string(),
        Some((index, _)) => format!("{}...", &text[..index]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_includes_detail() {
        let err = GraphError::Config("tenant_id must not be blank".to_string());
        assert_eq!(err.to_string(), "Configuration error: tenant_id must not be blank");
    }

    #[test]
    fn upstream_error_display_includes_status_and_body() {
        let err = GraphError::Upstream { status: 503, body: "retry later".to_string() };
        assert_eq!(err.to_string(), "Upstream error (503): retry later");
    }

    #[test]
    fn truncate_keeps_short_text_unchanged() {
        assert_eq!(truncate("short", 300), "short");
    }

    #[test]
    fn truncate_cuts_long_text_with_marker() {
        let long = "x".repeat(400);
        let cut = truncate(&long, 300);
        assert_eq!(cut.len(), 303);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn truncate_respects_multibyte_boundaries() {
        let text = "일정 생성 오류".repeat(100);
        let cut = truncate(&text, 10);
        assert!(cut.ends_with("..."));
        assert!(cut.chars().count() <= 13);
    }
}
