//! Error taxonomy for the model transport.

use serde::Deserialize;
use thiserror::Error;

/// A failed transport operation.
///
/// Every variant renders to a human-readable string suitable for direct
/// display; callers never need to unwrap the structure to report it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response. The message is extracted from the server's
    /// structured error body when present, otherwise a generic
    /// "operation failed (status N)".
    #[error("{message}")]
    Status { status: u16, message: String },

    /// Network-level failure (connection refused, timeout, bad URL).
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The response arrived but its body could not be decoded.
    #[error("malformed response body: {0}")]
    Body(String),
}

/// Structured error body the Delta APIs return:
/// `{"error": {"code": 500, "message": "..."}}`.
#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl ApiError {
    /// Builds a [`ApiError::Status`] from a response status and raw body.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .map(|e| e.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("operation failed (status {status})"));
        ApiError::Status { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_structured_message() {
        let err = ApiError::from_status(500, r#"{"error":{"code":500,"message":"disk full"}}"#);
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn falls_back_to_generic_message() {
        let err = ApiError::from_status(503, "<html>bad gateway</html>");
        assert_eq!(err.to_string(), "operation failed (status 503)");
    }

    #[test]
    fn empty_message_is_treated_as_absent() {
        let err = ApiError::from_status(400, r#"{"error":{"code":400,"message":""}}"#);
        assert_eq!(err.to_string(), "operation failed (status 400)");
    }
}
