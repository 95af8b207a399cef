//! Sync log entries: the audit trail of what each system accepted.
//!
//! Entries are append-only. The only transition after creation is
//! `Pending → Resolved`, applied by the reconciliation sweep.

use crate::{Error, OperationKind, SystemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Status of a sync log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Both systems applied the write.
    Success,
    /// The write succeeded on one system only and awaits reconciliation.
    Pending,
    /// The call failed.
    Failed,
    /// A pending divergence was later repaired.
    Resolved,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Pending => "pending",
            SyncStatus::Failed => "failed",
            SyncStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(SyncStatus::Success),
            "pending" => Ok(SyncStatus::Pending),
            "failed" => Ok(SyncStatus::Failed),
            "resolved" => Ok(SyncStatus::Resolved),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

/// One audit record describing a dual write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Time-ordered entry id (UUID v7).
    pub id: Uuid,
    pub table_name: String,
    /// The secondary system's id for the record, if known.
    pub record_id: Option<String>,
    /// The primary system's id for the record, if known.
    pub remote_id: Option<String>,
    pub operation: OperationKind,
    pub status: SyncStatus,
    /// For pending entries, the system that still lacks the write.
    pub failed_system: Option<SystemId>,
    pub error_message: Option<String>,
    pub request_payload: Value,
    pub response_payload: Value,
    pub created_at: DateTime<Utc>,
}

impl SyncLogEntry {
    /// A new entry stamped with the current time and no ids or payloads.
    pub fn new(table_name: impl Into<String>, operation: OperationKind, status: SyncStatus) -> Self {
        Self {
            id: Uuid::now_v7(),
            table_name: table_name.into(),
            record_id: None,
            remote_id: None,
            operation,
            status,
            failed_system: None,
            error_message: None,
            request_payload: Value::Null,
            response_payload: Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Whether `key` identifies this entry's record on either system.
    pub fn matches_key(&self, key: &str) -> bool {
        self.record_id.as_deref() == Some(key) || self.remote_id.as_deref() == Some(key)
    }
}
