//! Entity types and logical operation requests.
//!
//! An `OperationRequest` lives for the duration of one orchestrator call.
//! Its payload is an opaque JSON map; the only fields the core ever reads
//! are identifiers (`thing_id` / `channel_id` for connections).

use crate::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Opaque key-value payload passed through to the backends.
pub type Payload = Map<String, Value>;

/// The kinds of entity the dual-write core mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A device ("thing") on the IoT platform.
    Thing,
    /// A message channel.
    Channel,
    /// A thing ↔ channel connection.
    Connection,
    /// A LoRaWAN device: a thing on the primary plus a detail row on the secondary.
    #[serde(rename = "lorawan_device")]
    LoRaWanDevice,
}

impl EntityType {
    /// All entity types, in sync-log table order.
    pub const ALL: [EntityType; 4] = [
        EntityType::Thing,
        EntityType::Channel,
        EntityType::Connection,
        EntityType::LoRaWanDevice,
    ];

    /// Sync log table name for this entity type.
    pub const fn table_name(self) -> &'static str {
        match self {
            EntityType::Thing => "things",
            EntityType::Channel => "channels",
            EntityType::Connection => "connections",
            EntityType::LoRaWanDevice => "lorawan_devices",
        }
    }

    /// Resolves an entity type from its sync log table name.
    pub fn from_table_name(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.table_name() == table)
    }

    /// Whether creating this entity spans both systems under one identity.
    ///
    /// Composite creates always run primary first and pass the primary's id
    /// into the secondary create.
    pub const fn is_composite(self) -> bool {
        matches!(self, EntityType::LoRaWanDevice)
    }

    const fn as_str(self) -> &'static str {
        match self {
            EntityType::Thing => "thing",
            EntityType::Channel => "channel",
            EntityType::Connection => "connection",
            EntityType::LoRaWanDevice => "lorawan_device",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownEntityType(s.to_string()))
    }
}

/// A logical mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    Connect,
    Disconnect,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Connect => "connect",
            OperationKind::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(OperationKind::Create),
            "update" => Ok(OperationKind::Update),
            "delete" => Ok(OperationKind::Delete),
            "connect" => Ok(OperationKind::Connect),
            "disconnect" => Ok(OperationKind::Disconnect),
            other => Err(Error::UnknownOperation(other.to_string())),
        }
    }
}

/// One logical mutation to apply to both systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub entity_type: EntityType,
    /// Absent on create; the creating system assigns it.
    pub entity_id: Option<String>,
    pub payload: Payload,
}

impl OperationRequest {
    /// A create request.
    pub fn create(entity_type: EntityType, payload: Payload) -> Self {
        Self {
            kind: OperationKind::Create,
            entity_type,
            entity_id: None,
            payload,
        }
    }

    /// An update request for an existing entity.
    pub fn update(entity_type: EntityType, id: impl Into<String>, payload: Payload) -> Self {
        Self {
            kind: OperationKind::Update,
            entity_type,
            entity_id: Some(id.into()),
            payload,
        }
    }

    /// A delete request for an existing entity.
    pub fn delete(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Delete,
            entity_type,
            entity_id: Some(id.into()),
            payload: Payload::new(),
        }
    }

    /// Connects a thing to a channel.
    pub fn connect(thing_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self::connection(OperationKind::Connect, thing_id.into(), channel_id.into())
    }

    /// Disconnects a thing from a channel.
    pub fn disconnect(thing_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self::connection(OperationKind::Disconnect, thing_id.into(), channel_id.into())
    }

    fn connection(kind: OperationKind, thing_id: String, channel_id: String) -> Self {
        let mut payload = Payload::new();
        payload.insert("thing_id".into(), Value::String(thing_id));
        payload.insert("channel_id".into(), Value::String(channel_id));
        Self {
            kind,
            entity_type: EntityType::Connection,
            entity_id: None,
            payload,
        }
    }

    /// The `thing_id` of a connection request.
    pub fn thing_id(&self) -> Option<&str> {
        self.payload.get("thing_id").and_then(Value::as_str)
    }

    /// The `channel_id` of a connection request.
    pub fn channel_id(&self) -> Option<&str> {
        self.payload.get("channel_id").and_then(Value::as_str)
    }

    /// The key under which a connection is recorded in the sync log.
    pub fn connection_key(&self) -> Option<String> {
        match (self.thing_id(), self.channel_id()) {
            (Some(thing), Some(channel)) => Some(format!("{thing}:{channel}")),
            _ => None,
        }
    }

    /// Checks the request is well formed before any system is contacted.
    ///
    /// Only identifiers are inspected; payload contents are otherwise opaque.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: String| -> Result<(), Error> { Err(Error::InvalidRequest(msg)) };

        match (self.entity_type, self.kind) {
            (EntityType::Connection, OperationKind::Connect | OperationKind::Disconnect) => {
                for field in ["thing_id", "channel_id"] {
                    let present = self
                        .payload
                        .get(field)
                        .and_then(Value::as_str)
                        .is_some_and(|s| !s.trim().is_empty());
                    if !present {
                        return invalid(format!("{} requires `{field}`", self.kind));
                    }
                }
                Ok(())
            }
            (EntityType::Connection, kind) => {
                invalid(format!("connections do not support {kind}"))
            }
            (entity, OperationKind::Connect | OperationKind::Disconnect) => {
                invalid(format!("{} is only valid for connections, not {entity}", self.kind))
            }
            (entity, OperationKind::Create) => match &self.entity_id {
                Some(_) => invalid(format!("create {entity} must not carry an id")),
                None => Ok(()),
            },
            (entity, kind @ (OperationKind::Update | OperationKind::Delete)) => {
                let has_id = self
                    .entity_id
                    .as_deref()
                    .is_some_and(|id| !id.trim().is_empty());
                if !has_id {
                    return invalid(format!("{kind} {entity} requires an id"));
                }
                if kind == OperationKind::Update && self.payload.is_empty() {
                    return invalid(format!("update {entity} requires a non-empty payload"));
                }
                Ok(())
            }
        }
    }
}
