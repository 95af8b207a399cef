#![allow(dead_code)]

use fleetsync_client::mock::MockBackend;
use fleetsync_dualwrite::{
    DualWriteConfig, DualWriteService, MemorySyncLog, SyncLogError, SyncLogRecorder,
    SyncLogResult,
};
use fleetsync_types::{Payload, SyncLogEntry};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub primary: Arc<MockBackend>,
    pub secondary: Arc<MockBackend>,
    pub log: Arc<MemorySyncLog>,
    pub service: DualWriteService,
}

pub fn harness(config: DualWriteConfig) -> Harness {
    let primary = Arc::new(MockBackend::new("primary", "t"));
    let secondary = Arc::new(MockBackend::new("secondary", "s"));
    let log = Arc::new(MemorySyncLog::new());
    let service = DualWriteService::new(primary.clone(), secondary.clone(), log.clone(), config);
    Harness {
        primary,
        secondary,
        log,
        service,
    }
}

pub fn config(prefer_secondary: bool, fallback_enabled: bool) -> DualWriteConfig {
    DualWriteConfig {
        prefer_secondary,
        fallback_enabled,
    }
}

pub fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap()
}

/// A sync log whose every operation fails.
pub struct BrokenSyncLog;

impl SyncLogRecorder for BrokenSyncLog {
    fn append(&self, _entry: &SyncLogEntry) -> SyncLogResult<()> {
        Err(SyncLogError::Storage("disk full".into()))
    }

    fn list_pending(&self) -> SyncLogResult<Vec<SyncLogEntry>> {
        Err(SyncLogError::Storage("disk full".into()))
    }

    fn mark_resolved(&self, _table_name: &str, _record_id: &str) -> SyncLogResult<usize> {
        Err(SyncLogError::Storage("disk full".into()))
    }

    fn mark_entry_resolved(&self, _id: Uuid) -> SyncLogResult<bool> {
        Err(SyncLogError::Storage("disk full".into()))
    }
}
