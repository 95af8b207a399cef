//! Reconciliation sweep over pending sync log entries.
//!
//! A pending entry records a write that one system accepted and the other
//! missed. The sweep replays it against the system that missed it only, so
//! the healthy system never sees the write twice. Each replayed entry is
//! resolved by its own id; other pending entries for the same record stay
//! pending until their own replay succeeds.

use crate::orchestrator::DualWriteService;
use crate::sync_log::{SyncLogError, SyncLogRecorder, SyncLogResult};
use fleetsync_client::{ClientError, ClientResult};
use fleetsync_types::{EntityType, OperationKind, SyncLogEntry, SystemId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Pending entries picked up by the sweep.
    pub attempted: usize,
    /// Entries resolved, per entity type.
    pub resolved: BTreeMap<EntityType, usize>,
    pub errors: Vec<String>,
}

impl SyncSummary {
    pub fn total_resolved(&self) -> usize {
        self.resolved.values().sum()
    }

    pub fn resolved_for(&self, entity: EntityType) -> usize {
        self.resolved.get(&entity).copied().unwrap_or(0)
    }
}

impl DualWriteService {
    /// Replays every pending divergence against the system that missed it
    /// and marks the ones that now succeed as resolved.
    pub async fn sync_data(&self) -> SyncSummary {
        let mut summary = SyncSummary::default();

        let pending = match self.with_log(|log| log.list_pending()).await {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Failed to list pending sync log entries: {e}");
                summary.errors.push(format!("failed to list pending entries: {e}"));
                return summary;
            }
        };
        info!(count = pending.len(), "Reconciling pending sync log entries");

        for entry in pending {
            summary.attempted += 1;

            let Some(entity) = EntityType::from_table_name(&entry.table_name) else {
                summary
                    .errors
                    .push(format!("{}: unknown table `{}`", entry.id, entry.table_name));
                continue;
            };
            let Some(system) = entry.failed_system else {
                summary
                    .errors
                    .push(format!("{}: pending entry names no failed system", entry.id));
                continue;
            };
            let label = entry
                .remote_id
                .as_deref()
                .or(entry.record_id.as_deref())
                .unwrap_or("(no id)");

            if let Err(e) = self.replay(entity, system, &entry).await {
                warn!(%entity, %system, record = label, "Replay failed: {e}");
                summary.errors.push(format!(
                    "{} {} {label} on {system}: {e}",
                    entry.table_name, entry.operation
                ));
                continue;
            }

            let id = entry.id;
            match self.with_log(move |log| log.mark_entry_resolved(id)).await {
                Ok(true) => *summary.resolved.entry(entity).or_default() += 1,
                Ok(false) => debug!(%id, "Entry already resolved"),
                Err(e) => summary
                    .errors
                    .push(format!("{id}: replayed but not marked resolved: {e}")),
            }
        }

        summary
    }

    async fn replay(
        &self,
        entity: EntityType,
        system: SystemId,
        entry: &SyncLogEntry,
    ) -> ClientResult<()> {
        let backend = self.backend(system);
        let payload = entry.request_payload.as_object().cloned().unwrap_or_default();
        let other_id = match system {
            SystemId::Primary => entry.record_id.as_deref(),
            SystemId::Secondary => entry.remote_id.as_deref(),
        };
        let entity_id = || {
            entry
                .remote_id
                .as_deref()
                .or(entry.record_id.as_deref())
                .ok_or_else(|| ClientError::InvalidRequest("entry has no record id".into()))
        };
        let connection = || match (
            payload.get("thing_id").and_then(|v| v.as_str()),
            payload.get("channel_id").and_then(|v| v.as_str()),
        ) {
            (Some(thing), Some(channel)) => Ok((thing, channel)),
            _ => Err(ClientError::InvalidRequest(
                "connection entry lacks `thing_id`/`channel_id`".into(),
            )),
        };

        match entry.operation {
            OperationKind::Create => backend.create(entity, &payload, other_id).await.map(drop),
            OperationKind::Update => backend.update(entity, entity_id()?, &payload).await.map(drop),
            OperationKind::Delete => tolerate_missing(backend.delete(entity, entity_id()?).await),
            OperationKind::Connect => {
                let (thing, channel) = connection()?;
                backend.connect(thing, channel).await.map(drop)
            }
            OperationKind::Disconnect => {
                let (thing, channel) = connection()?;
                tolerate_missing(backend.disconnect(thing, channel).await)
            }
        }
    }

    async fn with_log<T, F>(&self, f: F) -> SyncLogResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SyncLogRecorder) -> SyncLogResult<T> + Send + 'static,
    {
        let log = Arc::clone(&self.sync_log);
        tokio::task::spawn_blocking(move || f(log.as_ref()))
            .await
            .map_err(|e| SyncLogError::Storage(format!("sync log task failed: {e}")))?
    }
}

/// A removal the failed system no longer has anything to remove for is done.
fn tolerate_missing(result: ClientResult<()>) -> ClientResult<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
