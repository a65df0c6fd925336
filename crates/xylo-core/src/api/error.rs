//! Backend error taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of backend errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// Connection refused, DNS failure, broken request
    Transport,
    /// The request exceeded its deadline
    Timeout,
    /// Non-success HTTP status (4xx, 5xx)
    HttpStatus,
    /// Response body did not have the expected shape
    Parse,
    /// Local I/O failure (e.g. reading a file to upload)
    Io,
    /// The request was cancelled by the user
    Cancelled,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Transport => write!(f, "transport"),
            ApiErrorKind::Timeout => write!(f, "timeout"),
            ApiErrorKind::HttpStatus => write!(f, "http_status"),
            ApiErrorKind::Parse => write!(f, "parse"),
            ApiErrorKind::Io => write!(f, "io"),
            ApiErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Structured error from the backend with kind and details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error category
    pub kind: ApiErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
    /// HTTP status when `kind` is `HttpStatus`
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            status: None,
        }
    }

    /// Creates an HTTP status error, preferring the backend's own message.
    ///
    /// FastAPI reports errors as `{"detail": "..."}`; other services use
    /// `{"error": {"message": "..."}}`.
    pub fn http_status(status: u16, body: &str) -> Self {
        let extracted = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| extract_error_message(&json));
        let message = match extracted {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind: ApiErrorKind::HttpStatus,
            message,
            details: (!body.is_empty()).then(|| body.to_string()),
            status: Some(status),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Timeout, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Parse, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Io, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ApiErrorKind::Cancelled, "Request cancelled")
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ApiErrorKind::Timeout
    }
}

fn extract_error_message(json: &Value) -> Option<String> {
    match json.get("detail") {
        Some(Value::String(detail)) => return Some(detail.clone()),
        // Validation errors: [{"msg": "...", ...}]
        Some(Value::Array(items)) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !msgs.is_empty() {
                return Some(msgs.join("; "));
            }
        }
        _ => {}
    }
    json.get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Classifies a reqwest failure.
pub(crate) fn classify_reqwest_error(e: &reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ApiError::new(ApiErrorKind::Transport, format!("Connection failed: {e}"))
    } else if e.is_decode() {
        ApiError::parse(format!("Invalid response body: {e}"))
    } else if e.is_request() {
        ApiError::new(ApiErrorKind::Transport, format!("Request error: {e}"))
    } else {
        ApiError::new(ApiErrorKind::Transport, format!("Network error: {e}"))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for backend operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_uses_fastapi_detail() {
        let err = ApiError::http_status(404, r#"{"detail":"File not found"}"#);
        assert_eq!(err.kind, ApiErrorKind::HttpStatus);
        assert_eq!(err.status, Some(404));
        assert_eq!(err.message, "HTTP 404: File not found");
        assert_eq!(err.details.as_deref(), Some(r#"{"detail":"File not found"}"#));
    }

    #[test]
    fn test_http_status_joins_validation_messages() {
        let body = r#"{"detail":[{"loc":["body","url"],"msg":"field required"},{"msg":"bad"}]}"#;
        let err = ApiError::http_status(422, body);
        assert_eq!(err.message, "HTTP 422: field required; bad");
    }

    #[test]
    fn test_http_status_uses_error_message() {
        let err = ApiError::http_status(500, r#"{"error":{"message":"boom"}}"#);
        assert_eq!(err.message, "HTTP 500: boom");
    }

    #[test]
    fn test_http_status_plain_body() {
        let err = ApiError::http_status(502, "Bad Gateway");
        assert_eq!(err.message, "HTTP 502");
        assert_eq!(err.details.as_deref(), Some("Bad Gateway"));

        let empty = ApiError::http_status(500, "");
        assert_eq!(empty.details, None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ApiErrorKind::Timeout.to_string(), "timeout");
        assert_eq!(ApiErrorKind::HttpStatus.to_string(), "http_status");
        assert!(ApiError::timeout("slow").is_timeout());
        assert_eq!(ApiError::cancelled().kind, ApiErrorKind::Cancelled);
    }
}
