//! Error types for the dual-write core.

use fleetsync_types::SystemId;
use std::fmt;
use thiserror::Error;

/// Result type for orchestrator writes.
pub type WriteResult<T> = Result<T, DualWriteError>;

/// One system's failure, as recorded in a combined failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemFailure {
    pub system: SystemId,
    pub message: String,
}

impl SystemFailure {
    pub fn new(system: SystemId, message: impl Into<String>) -> Self {
        Self {
            system,
            message: message.into(),
        }
    }
}

impl fmt::Display for SystemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.system, self.message)
    }
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DualWriteError {
    /// The request was malformed; no system was contacted.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The first-attempted system failed and no fallback was allowed.
    #[error("{system} system unavailable: {message}")]
    SystemUnavailable { system: SystemId, message: String },

    /// Both systems were attempted and both failed.
    #[error("both systems failed ({first}; {second})")]
    CombinedFailure {
        first: SystemFailure,
        second: SystemFailure,
    },
}

impl DualWriteError {
    /// The per-system failures carried by this error.
    pub fn failures(&self) -> Vec<SystemFailure> {
        match self {
            DualWriteError::Validation(_) => Vec::new(),
            DualWriteError::SystemUnavailable { system, message } => {
                vec![SystemFailure::new(*system, message.clone())]
            }
            DualWriteError::CombinedFailure { first, second } => {
                vec![first.clone(), second.clone()]
            }
        }
    }

    /// Whether the caller caused this error.
    pub fn is_validation(&self) -> bool {
        matches!(self, DualWriteError::Validation(_))
    }
}

impl From<fleetsync_types::Error> for DualWriteError {
    fn from(e: fleetsync_types::Error) -> Self {
        DualWriteError::Validation(e.to_string())
    }
}
