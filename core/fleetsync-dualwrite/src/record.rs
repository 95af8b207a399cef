//! Builds sync log entries from dual-write outcomes.

use crate::error::DualWriteError;
use fleetsync_types::{
    DualWriteResult, OperationKind, OperationRequest, SyncLogEntry, SyncStatus,
};
use serde_json::{Value, json};

/// Summarises one call for the sync log.
///
/// Status is `success` when both systems took the write, `pending` when
/// the call succeeded on one system only, and `failed` when the call failed.
pub(crate) fn entry_for(
    request: &OperationRequest,
    result: &DualWriteResult,
    error: Option<&DualWriteError>,
) -> SyncLogEntry {
    let status = match (error, result.diverged_system()) {
        (Some(_), _) => SyncStatus::Failed,
        (None, Some(_)) => SyncStatus::Pending,
        (None, None) => SyncStatus::Success,
    };

    let mut entry = SyncLogEntry::new(request.entity_type.table_name(), request.kind, status);

    match request.kind {
        OperationKind::Create => {
            entry.remote_id = result.primary.returned_id();
            entry.record_id = result.secondary.returned_id();
        }
        OperationKind::Update | OperationKind::Delete => {
            entry.remote_id = request.entity_id.clone();
            entry.record_id = request.entity_id.clone();
        }
        OperationKind::Connect | OperationKind::Disconnect => {
            let key = request.connection_key();
            entry.remote_id = key.clone();
            entry.record_id = key;
        }
    }

    if status == SyncStatus::Pending {
        entry.failed_system = result.diverged_system();
    }

    let errors: Vec<String> = [&result.primary, &result.secondary]
        .into_iter()
        .filter_map(|o| o.error.as_ref().map(|e| format!("{}: {e}", o.system)))
        .collect();
    if !errors.is_empty() {
        entry.error_message = Some(errors.join("; "));
    }

    entry.request_payload = Value::Object(request.payload.clone());
    entry.response_payload = json!({
        "primary": result.primary.data,
        "secondary": result.secondary.data,
    });
    entry
}
