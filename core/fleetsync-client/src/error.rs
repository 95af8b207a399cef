//! Client error types.

use thiserror::Error;

/// Result type for backend calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors a backend call can produce.
///
/// Every variant means "this system did not take the write"; the
/// orchestrator records the message and decides about fallback.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl ClientError {
    /// Returns true if the system answered with a 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            ClientError::Status { status, .. } => *status == 404,
            ClientError::Http(e) => e.status().is_some_and(|s| s.as_u16() == 404),
            _ => false,
        }
    }
}
