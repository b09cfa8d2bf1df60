//! Error taxonomy for the quarry engine

use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// A dependency was unreachable, refused the connection, or timed out
    #[error("{service} unavailable: {message}")]
    BackendUnavailable { service: String, message: String },

    /// A dependency was reachable but returned a structured failure
    #[error("{service} error: {message}")]
    BackendError { service: String, message: String },

    #[error("file error: {path}")]
    FileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Grammar failure; downgraded to an `other` chunk at the chunker
    /// boundary and not surfaced past it
    #[error("parse error in {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("operation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

impl EngineError {
    pub fn backend_unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable { service: service.into(), message: message.into() }
    }

    pub fn backend_error(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendError { service: service.into(), message: message.into() }
    }

    pub fn file_error(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError { path: path.into(), source }
    }

    pub fn parse_error(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseError { path: path.into(), reason: reason.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    pub fn timeout(elapsed_ms: u64) -> Self {
        Self::Timeout { elapsed_ms }
    }

    /// Whether the store was unreachable rather than rejecting the request
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::BackendUnavailable { .. } | Self::Timeout { .. } => true,
            Self::BackendError { .. } => true,
            Self::FileError { .. }
            | Self::ParseError { .. }
            | Self::InvalidArgument { .. } => false,
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Heuristic for transport-level failures in a rendered error message
fn message_looks_unreachable(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["unavailable", "connection refused", "connect", "transport", "timed out", "timeout", "dns", "broken pipe"]
        .iter()
        .any(|needle| lower.contains(needle))
}

impl From<qdrant_client::QdrantError> for EngineError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        let message = err.to_string();
        if matches!(&err, qdrant_client::QdrantError::Io(_)) || message_looks_unreachable(&message)
        {
            Self::backend_unavailable("Qdrant", message)
        } else {
            Self::backend_error("Qdrant", message)
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::backend_unavailable("embedding backend", err.to_string())
        } else {
            Self::backend_error("embedding backend", err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_unreachable_heuristic() {
        assert!(message_looks_unreachable("status: Unavailable, message: \"error trying to connect\""));
        assert!(message_looks_unreachable("deadline timed out"));
        assert!(!message_looks_unreachable("collection `codebase` not found"));
    }

    #[test]
    fn test_invalid_argument_is_not_retryable() {
        let fixture = EngineError::invalid_argument("at least one filter is required");

        assert_eq!(fixture.is_retryable(), false);
        assert_eq!(fixture.is_unavailable(), false);
    }

    #[test]
    fn test_timeout_display() {
        let actual = EngineError::timeout(5_000).to_string();
        let expected = "operation timed out after 5000ms";

        assert_eq!(actual, expected);
    }
}
