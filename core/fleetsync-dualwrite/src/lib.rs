//! Dual-write core for fleetsync.
//!
//! Every mutation is written to two independent backends: the IoT platform
//! (primary) and the database-backed backup API (secondary).
//!
//! # Components
//!
//! - **Orchestrator** ([`DualWriteService`]): runs one logical operation
//!   against both systems in a fixed order, falls back when the first one
//!   fails, and returns a [`DualWriteResult`](fleetsync_types::DualWriteResult)
//!   describing what each system did
//! - **Sync log** ([`SyncLogRecorder`]): append-only audit trail of every
//!   write, with SQLite and in-memory recorders
//! - **Reconciliation** ([`DualWriteService::sync_data`]): replays pending
//!   divergences against the system that missed them
//!
//! # Write algorithm
//!
//! 1. Validate the request (never touches a system on failure)
//! 2. Call the first system; on success, call the second one with the
//!    first system's id as cross reference
//! 3. If the first system failed and fallback is enabled, call the second
//! 4. Append a sync log entry; a failing sync log is logged and ignored
//!
//! Only a write that no system accepted is an error for the caller.
//!
//! # Example
//!
//! ```
//! use fleetsync_client::mock::MockBackend;
//! use fleetsync_dualwrite::{DualWriteConfig, DualWriteService, MemorySyncLog};
//! use std::sync::Arc;
//!
//! let service = DualWriteService::new(
//!     Arc::new(MockBackend::new("primary", "t")),
//!     Arc::new(MockBackend::new("secondary", "s")),
//!     Arc::new(MemorySyncLog::new()),
//!     DualWriteConfig::default(),
//! );
//! assert!(service.config().fallback_enabled);
//! ```

mod config;
mod error;
pub mod offline;
mod orchestrator;
mod reconcile;
mod record;
mod status;
pub mod sync_log;

pub use config::DualWriteConfig;
pub use error::{DualWriteError, SystemFailure, WriteResult};
pub use orchestrator::{DualWriteService, ReadOutcome, ReadSource, Written};
pub use reconcile::SyncSummary;
pub use status::{Availability, SystemStatus};
pub use sync_log::{MemorySyncLog, SqliteSyncLog, SyncLogError, SyncLogRecorder, SyncLogResult};
