//! Sync log recorders.
//!
//! The orchestrator appends entries and lists the pending ones. Entries are
//! resolved either one at a time by entry id (the reconciliation sweep) or
//! all at once for a record. Appends may arrive from
//! concurrent calls; recorders serialise them internally.

mod memory;
mod sqlite;

pub use memory::MemorySyncLog;
pub use sqlite::SqliteSyncLog;

use fleetsync_types::SyncLogEntry;
use thiserror::Error;
use uuid::Uuid;

/// Result type for sync log operations.
pub type SyncLogResult<T> = Result<T, SyncLogError>;

/// Errors that can occur while reading or writing the sync log.
#[derive(Debug, Error)]
pub enum SyncLogError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored row could not be decoded.
    #[error("corrupt sync log row: {0}")]
    Corrupt(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A writer panicked while holding the log lock.
    #[error("sync log lock poisoned")]
    Poisoned,
}

/// Where the orchestrator writes its audit trail.
pub trait SyncLogRecorder: Send + Sync {
    /// Appends an entry.
    fn append(&self, entry: &SyncLogEntry) -> SyncLogResult<()>;

    /// Returns all pending entries, oldest first.
    fn list_pending(&self) -> SyncLogResult<Vec<SyncLogEntry>>;

    /// Marks pending entries of `table_name` whose record id or remote id
    /// equals `record_id` as resolved. Returns how many entries changed.
    fn mark_resolved(&self, table_name: &str, record_id: &str) -> SyncLogResult<usize>;

    /// Marks one pending entry as resolved. Returns false if no pending
    /// entry has that id.
    fn mark_entry_resolved(&self, id: Uuid) -> SyncLogResult<bool>;
}
