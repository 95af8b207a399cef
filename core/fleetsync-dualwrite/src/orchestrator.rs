//! Dual-write orchestrator.
//!
//! Runs one logical operation against the primary and secondary systems,
//! sequentially, in an order fixed by [`DualWriteConfig`]. The two calls are
//! never concurrent: the second call of a create needs the id the first
//! system assigned.

use crate::config::DualWriteConfig;
use crate::error::{DualWriteError, SystemFailure, WriteResult};
use crate::offline;
use crate::record;
use crate::status::{Availability, SystemStatus};
use crate::sync_log::SyncLogRecorder;
use fleetsync_client::{Backend, ClientError, ClientResult, ListFilters};
use fleetsync_types::{
    DualWriteResult, EntityType, OperationKind, OperationRequest, Payload, SystemId,
    SystemOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The payload a convenience write returns, tagged with the system it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Written {
    Primary(Value),
    Secondary(Value),
}

impl Written {
    /// Picks the first-attempted system's payload if it succeeded, else the other's.
    pub fn pick(result: &DualWriteResult, first: SystemId) -> Option<Self> {
        [first, first.other()].into_iter().find_map(|system| {
            let outcome = result.outcome(system);
            if !outcome.success {
                return None;
            }
            let data = outcome.data.clone().unwrap_or(Value::Null);
            Some(match system {
                SystemId::Primary => Written::Primary(data),
                SystemId::Secondary => Written::Secondary(data),
            })
        })
    }

    pub fn system(&self) -> SystemId {
        match self {
            Written::Primary(_) => SystemId::Primary,
            Written::Secondary(_) => SystemId::Secondary,
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            Written::Primary(v) | Written::Secondary(v) => v,
        }
    }

    pub fn into_payload(self) -> Value {
        match self {
            Written::Primary(v) | Written::Secondary(v) => v,
        }
    }
}

/// Where a read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSource {
    Primary,
    Secondary,
    /// Neither system answered; items are static placeholders.
    Offline,
}

impl From<SystemId> for ReadSource {
    fn from(system: SystemId) -> Self {
        match system {
            SystemId::Primary => ReadSource::Primary,
            SystemId::Secondary => ReadSource::Secondary,
        }
    }
}

/// The items of a read and where they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadOutcome {
    pub source: ReadSource,
    pub items: Vec<Value>,
}

/// The dual-write orchestrator.
///
/// Stateless between calls apart from its configuration; concurrent calls
/// share nothing but the sync log.
pub struct DualWriteService {
    pub(crate) primary: Arc<dyn Backend>,
    pub(crate) secondary: Arc<dyn Backend>,
    pub(crate) sync_log: Arc<dyn SyncLogRecorder>,
    config: DualWriteConfig,
}

impl DualWriteService {
    pub fn new(
        primary: Arc<dyn Backend>,
        secondary: Arc<dyn Backend>,
        sync_log: Arc<dyn SyncLogRecorder>,
        config: DualWriteConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            sync_log,
            config,
        }
    }

    pub fn config(&self) -> &DualWriteConfig {
        &self.config
    }

    pub(crate) fn backend(&self, system: SystemId) -> &dyn Backend {
        match system {
            SystemId::Primary => self.primary.as_ref(),
            SystemId::Secondary => self.secondary.as_ref(),
        }
    }

    /// The call order for a request. Composite creates always start on the
    /// primary so the secondary can reference the primary's id.
    pub fn call_order(&self, request: &OperationRequest) -> (SystemId, SystemId) {
        let first = if is_composite_create(request) {
            SystemId::Primary
        } else {
            self.config.preferred_system()
        };
        (first, first.other())
    }

    fn fallback_allowed(&self, request: &OperationRequest) -> bool {
        self.config.fallback_enabled && !is_composite_create(request)
    }

    /// Applies `request` to one system.
    pub(crate) async fn apply(
        &self,
        system: SystemId,
        request: &OperationRequest,
        cross_ref: Option<&str>,
    ) -> ClientResult<Value> {
        let backend = self.backend(system);
        let entity = request.entity_type;
        debug!(
            %system,
            backend = backend.name(),
            %entity,
            kind = %request.kind,
            "Applying operation"
        );

        match request.kind {
            OperationKind::Create => backend.create(entity, &request.payload, cross_ref).await,
            OperationKind::Update => {
                let id = required_id(request)?;
                backend.update(entity, id, &request.payload).await
            }
            OperationKind::Delete => {
                let id = required_id(request)?;
                backend.delete(entity, id).await.map(|()| Value::Null)
            }
            OperationKind::Connect => {
                let (thing, channel) = connection_ids(request)?;
                backend.connect(thing, channel).await
            }
            OperationKind::Disconnect => {
                let (thing, channel) = connection_ids(request)?;
                backend.disconnect(thing, channel).await.map(|()| Value::Null)
            }
        }
    }

    /// Executes one mutation against both systems.
    ///
    /// Fails with `Validation` before contacting anything, with
    /// `SystemUnavailable` when the first system fails and no fallback is
    /// allowed, and with `CombinedFailure` when both systems fail. A failure
    /// of the second system after the first succeeded is recorded in the
    /// result, not raised.
    pub async fn execute(&self, request: &OperationRequest) -> WriteResult<DualWriteResult> {
        request.validate()?;

        let mut result = DualWriteResult::new();
        let outcome = self.run(request, &mut result).await;

        self.record(request, &result, outcome.as_ref().err()).await;
        outcome.map(|()| result)
    }

    async fn run(&self, request: &OperationRequest, result: &mut DualWriteResult) -> WriteResult<()> {
        let (first, second) = self.call_order(request);

        match self.apply(first, request, None).await {
            Ok(data) => {
                let cross_ref = match request.kind {
                    OperationKind::Create => {
                        let outcome = SystemOutcome::succeeded(first, data);
                        let id = outcome.returned_id();
                        result.set_outcome(outcome);
                        id
                    }
                    _ => {
                        result.set_outcome(SystemOutcome::succeeded(first, data));
                        None
                    }
                };
                result.primary_succeeded = true;

                if is_composite_create(request) && cross_ref.is_none() {
                    warn!(
                        entity = %request.entity_type,
                        "Primary returned no id; secondary create has no cross reference"
                    );
                }

                match self.apply(second, request, cross_ref.as_deref()).await {
                    Ok(data) => result.set_outcome(SystemOutcome::succeeded(second, data)),
                    Err(e) => {
                        warn!(
                            system = %second,
                            entity = %request.entity_type,
                            kind = %request.kind,
                            "Second write failed, keeping first system's result: {e}"
                        );
                        result.set_outcome(SystemOutcome::failed(second, e.to_string()));
                    }
                }
                Ok(())
            }
            Err(e1) => {
                let first_message = e1.to_string();
                result.set_outcome(SystemOutcome::failed(first, first_message.clone()));

                if !self.fallback_allowed(request) {
                    return Err(DualWriteError::SystemUnavailable {
                        system: first,
                        message: first_message,
                    });
                }

                warn!(
                    failed = %first,
                    fallback = %second,
                    entity = %request.entity_type,
                    "First write failed, falling back: {first_message}"
                );

                match self.apply(second, request, None).await {
                    Ok(data) => {
                        result.set_outcome(SystemOutcome::succeeded(second, data));
                        result.fallback_used = true;
                        Ok(())
                    }
                    Err(e2) => {
                        let second_message = e2.to_string();
                        result.set_outcome(SystemOutcome::failed(second, second_message.clone()));
                        Err(DualWriteError::CombinedFailure {
                            first: SystemFailure::new(first, first_message),
                            second: SystemFailure::new(second, second_message),
                        })
                    }
                }
            }
        }
    }

    /// Appends the call's sync log entry. Failures are logged and dropped.
    async fn record(
        &self,
        request: &OperationRequest,
        result: &DualWriteResult,
        error: Option<&DualWriteError>,
    ) {
        let entry = record::entry_for(request, result, error);
        let status = entry.status;
        let log = Arc::clone(&self.sync_log);

        match tokio::task::spawn_blocking(move || log.append(&entry)).await {
            Ok(Ok(())) => debug!(%status, "Sync log entry appended"),
            Ok(Err(e)) => warn!("Failed to append sync log entry: {e}"),
            Err(e) => warn!("Sync log task failed: {e}"),
        }
    }

    /// Executes `request` and returns the payload of the system that took it,
    /// preferring the first-attempted one.
    pub async fn write(&self, request: OperationRequest) -> WriteResult<Written> {
        let (first, _) = self.call_order(&request);
        let result = self.execute(&request).await?;
        Written::pick(&result, first).ok_or_else(|| combined_from(&result, first))
    }

    // ── Things ───────────────────────────────────────────────────

    pub async fn create_thing(&self, data: Payload) -> WriteResult<Written> {
        self.write(OperationRequest::create(EntityType::Thing, data)).await
    }

    pub async fn update_thing(&self, id: &str, data: Payload) -> WriteResult<Written> {
        self.write(OperationRequest::update(EntityType::Thing, id, data)).await
    }

    pub async fn delete_thing(&self, id: &str) -> WriteResult<Written> {
        self.write(OperationRequest::delete(EntityType::Thing, id)).await
    }

    pub async fn get_things(&self, filters: &ListFilters) -> Vec<Value> {
        self.get(EntityType::Thing, filters).await.items
    }

    // ── Channels ─────────────────────────────────────────────────

    pub async fn create_channel(&self, data: Payload) -> WriteResult<Written> {
        self.write(OperationRequest::create(EntityType::Channel, data)).await
    }

    pub async fn update_channel(&self, id: &str, data: Payload) -> WriteResult<Written> {
        self.write(OperationRequest::update(EntityType::Channel, id, data)).await
    }

    pub async fn delete_channel(&self, id: &str) -> WriteResult<Written> {
        self.write(OperationRequest::delete(EntityType::Channel, id)).await
    }

    pub async fn get_channels(&self, filters: &ListFilters) -> Vec<Value> {
        self.get(EntityType::Channel, filters).await.items
    }

    // ── Connections ──────────────────────────────────────────────

    pub async fn connect_thing_to_channel(
        &self,
        thing_id: &str,
        channel_id: &str,
    ) -> WriteResult<Written> {
        self.write(OperationRequest::connect(thing_id, channel_id)).await
    }

    pub async fn disconnect_thing_from_channel(
        &self,
        thing_id: &str,
        channel_id: &str,
    ) -> WriteResult<Written> {
        self.write(OperationRequest::disconnect(thing_id, channel_id)).await
    }

    pub async fn get_connections(&self, filters: &ListFilters) -> Vec<Value> {
        self.get(EntityType::Connection, filters).await.items
    }

    // ── LoRaWAN devices ──────────────────────────────────────────

    /// Creates the device's thing on the primary, then its detail row on the
    /// secondary keyed by the new thing id. A failed detail row does not
    /// undo the thing.
    pub async fn create_lorawan_device(&self, data: Payload) -> WriteResult<Written> {
        self.write(OperationRequest::create(EntityType::LoRaWanDevice, data)).await
    }

    pub async fn update_lorawan_device(&self, id: &str, data: Payload) -> WriteResult<Written> {
        self.write(OperationRequest::update(EntityType::LoRaWanDevice, id, data)).await
    }

    pub async fn delete_lorawan_device(&self, id: &str) -> WriteResult<Written> {
        self.write(OperationRequest::delete(EntityType::LoRaWanDevice, id)).await
    }

    pub async fn get_lorawan_devices(&self, filters: &ListFilters) -> Vec<Value> {
        self.get(EntityType::LoRaWanDevice, filters).await.items
    }

    // ── Reads & status ───────────────────────────────────────────

    /// Lists entities. Never fails: when no system answers, the static
    /// offline placeholder set is returned instead.
    pub async fn get(&self, entity: EntityType, filters: &ListFilters) -> ReadOutcome {
        let first = self.config.preferred_system();

        match self.backend(first).list(entity, filters).await {
            Ok(items) => {
                return ReadOutcome {
                    source: first.into(),
                    items,
                };
            }
            Err(e) => warn!(system = %first, %entity, "Read failed: {e}"),
        }

        if self.config.fallback_enabled {
            let second = first.other();
            match self.backend(second).list(entity, filters).await {
                Ok(items) => {
                    return ReadOutcome {
                        source: second.into(),
                        items,
                    };
                }
                Err(e) => warn!(system = %second, %entity, "Fallback read failed: {e}"),
            }
        }

        info!(%entity, "Serving offline placeholder data");
        ReadOutcome {
            source: ReadSource::Offline,
            items: offline::placeholder(entity),
        }
    }

    /// Checks both systems' health endpoints. Never fails.
    pub async fn system_status(&self) -> SystemStatus {
        let (primary, secondary) = tokio::join!(self.primary.health(), self.secondary.health());
        let availability = |check: ClientResult<()>| match check {
            Ok(()) => Availability::up(),
            Err(e) => Availability::down(e.to_string()),
        };

        SystemStatus {
            primary: availability(primary),
            secondary: availability(secondary),
            fallback_enabled: self.config.fallback_enabled,
            preferred_system: self.config.preferred_system(),
        }
    }
}

fn is_composite_create(request: &OperationRequest) -> bool {
    request.kind == OperationKind::Create && request.entity_type.is_composite()
}

fn required_id(request: &OperationRequest) -> ClientResult<&str> {
    request
        .entity_id
        .as_deref()
        .ok_or_else(|| ClientError::InvalidRequest(format!("{} requires an id", request.kind)))
}

fn connection_ids(request: &OperationRequest) -> ClientResult<(&str, &str)> {
    match (request.thing_id(), request.channel_id()) {
        (Some(thing), Some(channel)) => Ok((thing, channel)),
        _ => Err(ClientError::InvalidRequest(
            "connection requires `thing_id` and `channel_id`".into(),
        )),
    }
}

fn combined_from(result: &DualWriteResult, first: SystemId) -> DualWriteError {
    let failure = |system: SystemId| {
        let outcome = result.outcome(system);
        SystemFailure::new(
            system,
            outcome.error.clone().unwrap_or_else(|| "not attempted".into()),
        )
    };
    DualWriteError::CombinedFailure {
        first: failure(first),
        second: failure(first.other()),
    }
}
