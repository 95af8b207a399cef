//! SQLite-backed sync log.
//!
//! Uses its own database file so the audit trail is isolated from whatever
//! the backends store.

use super::{SyncLogError, SyncLogRecorder, SyncLogResult};
use chrono::{DateTime, Utc};
use fleetsync_types::{OperationKind, SyncLogEntry, SyncStatus, SystemId};
use rusqlite::{Connection, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, table_name, record_id, remote_id, operation, status, \
     failed_system, error_message, request_payload, response_payload, created_at";

/// Raw column values of one `sync_log` row.
type RawRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
);

/// Persistent sync log backed by SQLite.
pub struct SqliteSyncLog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSyncLog {
    /// Opens (or creates) a sync log at the given path.
    pub fn open(path: impl AsRef<Path>) -> SyncLogResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| SyncLogError::Storage(format!("failed to open sync log: {e}")))?;
        Self::init(conn)
    }

    /// Opens an in-memory sync log (for testing).
    pub fn open_in_memory() -> SyncLogResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            SyncLogError::Storage(format!("failed to open in-memory sync log: {e}"))
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> SyncLogResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sync_log (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                table_name TEXT NOT NULL,
                record_id TEXT,
                remote_id TEXT,
                operation TEXT NOT NULL,
                status TEXT NOT NULL,
                failed_system TEXT,
                error_message TEXT,
                request_payload TEXT NOT NULL,
                response_payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sync_log_status
                ON sync_log (status, table_name);
            ",
        )
        .map_err(|e| SyncLogError::Storage(format!("failed to init sync log schema: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> SyncLogResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SyncLogError::Poisoned)
    }

    /// Loads entries newest first, with pagination.
    pub fn load_entries(&self, limit: usize, offset: usize) -> SyncLogResult<Vec<SyncLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sync_log ORDER BY seq DESC LIMIT ?1 OFFSET ?2"
            ))
            .map_err(|e| SyncLogError::Storage(format!("failed to prepare sync log query: {e}")))?;

        let rows = stmt
            .query_map(params![limit as i64, offset as i64], read_row)
            .map_err(|e| SyncLogError::Storage(format!("failed to query sync log: {e}")))?;

        collect_entries(rows)
    }

    /// Returns the total number of entries.
    pub fn count(&self) -> SyncLogResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sync_log", [], |row| row.get(0))
            .map_err(|e| SyncLogError::Storage(format!("failed to count sync log: {e}")))?;
        Ok(count as usize)
    }
}

impl SyncLogRecorder for SqliteSyncLog {
    fn append(&self, entry: &SyncLogEntry) -> SyncLogResult<()> {
        let request = serde_json::to_string(&entry.request_payload)?;
        let response = serde_json::to_string(&entry.response_payload)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sync_log (id, table_name, record_id, remote_id, operation, status, \
             failed_system, error_message, request_payload, response_payload, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.id.to_string(),
                entry.table_name,
                entry.record_id,
                entry.remote_id,
                entry.operation.as_str(),
                entry.status.as_str(),
                entry.failed_system.map(SystemId::as_str),
                entry.error_message,
                request,
                response,
                entry.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| SyncLogError::Storage(format!("failed to append sync log entry: {e}")))?;
        Ok(())
    }

    fn list_pending(&self) -> SyncLogResult<Vec<SyncLogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM sync_log WHERE status = ?1 ORDER BY seq ASC"
            ))
            .map_err(|e| SyncLogError::Storage(format!("failed to prepare pending query: {e}")))?;

        let rows = stmt
            .query_map(params![SyncStatus::Pending.as_str()], read_row)
            .map_err(|e| SyncLogError::Storage(format!("failed to query pending entries: {e}")))?;

        collect_entries(rows)
    }

    fn mark_resolved(&self, table_name: &str, record_id: &str) -> SyncLogResult<usize> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE sync_log SET status = ?1 \
                 WHERE status = ?2 AND table_name = ?3 AND (record_id = ?4 OR remote_id = ?4)",
                params![
                    SyncStatus::Resolved.as_str(),
                    SyncStatus::Pending.as_str(),
                    table_name,
                    record_id,
                ],
            )
            .map_err(|e| SyncLogError::Storage(format!("failed to mark resolved: {e}")))?;
        Ok(changed)
    }

    fn mark_entry_resolved(&self, id: Uuid) -> SyncLogResult<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE sync_log SET status = ?1 WHERE id = ?2 AND status = ?3",
                params![
                    SyncStatus::Resolved.as_str(),
                    id.to_string(),
                    SyncStatus::Pending.as_str(),
                ],
            )
            .map_err(|e| SyncLogError::Storage(format!("failed to mark entry resolved: {e}")))?;
        Ok(changed > 0)
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn collect_entries(
    rows: impl Iterator<Item = rusqlite::Result<RawRow>>,
) -> SyncLogResult<Vec<SyncLogEntry>> {
    let mut result = Vec::new();
    for row in rows {
        let raw = row.map_err(|e| SyncLogError::Storage(format!("failed to read sync log row: {e}")))?;
        result.push(decode(raw)?);
    }
    Ok(result)
}

fn decode(raw: RawRow) -> SyncLogResult<SyncLogEntry> {
    let (
        id,
        table_name,
        record_id,
        remote_id,
        operation,
        status,
        failed_system,
        error_message,
        request,
        response,
        created_at,
    ) = raw;

    let corrupt = |what: &str, e: &dyn std::fmt::Display| SyncLogError::Corrupt(format!("{what}: {e}"));

    Ok(SyncLogEntry {
        id: Uuid::parse_str(&id).map_err(|e| corrupt("id", &e))?,
        table_name,
        record_id,
        remote_id,
        operation: operation.parse::<OperationKind>().map_err(|e| corrupt("operation", &e))?,
        status: status.parse::<SyncStatus>().map_err(|e| corrupt("status", &e))?,
        failed_system: failed_system
            .map(|s| s.parse::<SystemId>())
            .transpose()
            .map_err(|e| corrupt("failed_system", &e))?,
        error_message,
        request_payload: serde_json::from_str(&request)?,
        response_payload: serde_json::from_str(&response)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| corrupt("created_at", &e))?
            .with_timezone(&Utc),
    })
}
