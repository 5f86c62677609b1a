//! Error types for external calls and persistence.

use thiserror::Error;

/// Failure of a call to an external collaborator (feed, oracle, analytics, sink).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("request timed out")]
    Timeout,

    #[error("non-success status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl SourceError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Timeout | SourceError::Transport(_) => true,
            SourceError::Status(code) => *code == 429 || *code >= 500,
            SourceError::MalformedResponse(_) | SourceError::Unsupported(_) => false,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Status(status.as_u16())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::MalformedResponse(err.to_string())
    }
}

/// Failure of a persistent store operation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("position {0} is not open")]
    NotOpen(i64),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SourceError::Timeout.is_transient());
        assert!(SourceError::Status(429).is_transient());
        assert!(SourceError::Status(503).is_transient());
        assert!(!SourceError::Status(404).is_transient());
        assert!(!SourceError::MalformedResponse("bad".into()).is_transient());
    }
}
