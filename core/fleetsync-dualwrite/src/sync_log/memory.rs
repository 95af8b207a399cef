//! In-memory sync log.

use super::{SyncLogError, SyncLogRecorder, SyncLogResult};
use fleetsync_types::{SyncLogEntry, SyncStatus};
use std::sync::Mutex;
use uuid::Uuid;

/// A sync log kept in a vector. Entries are lost on drop.
#[derive(Debug, Default)]
pub struct MemorySyncLog {
    entries: Mutex<Vec<SyncLogEntry>>,
}

impl MemorySyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every entry, in append order.
    pub fn entries(&self) -> SyncLogResult<Vec<SyncLogEntry>> {
        Ok(self.entries.lock().map_err(|_| SyncLogError::Poisoned)?.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SyncLogRecorder for MemorySyncLog {
    fn append(&self, entry: &SyncLogEntry) -> SyncLogResult<()> {
        self.entries
            .lock()
            .map_err(|_| SyncLogError::Poisoned)?
            .push(entry.clone());
        Ok(())
    }

    fn list_pending(&self) -> SyncLogResult<Vec<SyncLogEntry>> {
        let entries = self.entries.lock().map_err(|_| SyncLogError::Poisoned)?;
        Ok(entries
            .iter()
            .filter(|e| e.status == SyncStatus::Pending)
            .cloned()
            .collect())
    }

    fn mark_resolved(&self, table_name: &str, record_id: &str) -> SyncLogResult<usize> {
        let mut entries = self.entries.lock().map_err(|_| SyncLogError::Poisoned)?;
        let mut changed = 0;
        for entry in entries.iter_mut().filter(|e| {
            e.status == SyncStatus::Pending && e.table_name == table_name && e.matches_key(record_id)
        }) {
            entry.status = SyncStatus::Resolved;
            changed += 1;
        }
        Ok(changed)
    }

    fn mark_entry_resolved(&self, id: Uuid) -> SyncLogResult<bool> {
        let mut entries = self.entries.lock().map_err(|_| SyncLogError::Poisoned)?;
        match entries
            .iter_mut()
            .find(|e| e.id == id && e.status == SyncStatus::Pending)
        {
            Some(entry) => {
                entry.status = SyncStatus::Resolved;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
