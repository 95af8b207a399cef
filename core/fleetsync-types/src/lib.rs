//! Core type definitions for fleetsync.
//!
//! This crate defines the data model the dual-write core passes between
//! the orchestrator, the backend clients and the sync log:
//! - Entity types and logical operation requests
//! - Per-system outcomes and the combined dual-write result
//! - Sync log entries (the audit trail of divergence)
//!
//! Payloads are opaque JSON maps. Nothing here knows the field shapes of
//! things, channels or LoRaWAN devices beyond their identifiers.

mod entity;
mod outcome;
mod sync_log;

pub use entity::{EntityType, OperationKind, OperationRequest, Payload};
pub use outcome::{DualWriteResult, SystemId, SystemOutcome};
pub use sync_log::{SyncLogEntry, SyncStatus};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("unknown sync status: {0}")]
    UnknownStatus(String),

    #[error("unknown system: {0}")]
    UnknownSystem(String),
}
