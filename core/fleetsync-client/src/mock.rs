//! An in-memory backend for testing.
//!
//! Records every call, hands out sequential ids on create, and fails any
//! operation that has been scripted to fail.

use crate::backend::{Backend, ListFilters};
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use fleetsync_types::{EntityType, Payload};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The operations a [`MockBackend`] can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Create,
    Update,
    Delete,
    List,
    Connect,
    Disconnect,
    Health,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub op: MockOp,
    pub entity: Option<EntityType>,
    pub id: Option<String>,
    pub cross_ref: Option<String>,
    pub payload: Payload,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<MockCall>,
    failures: HashMap<MockOp, String>,
    fail_all: Option<String>,
    next_id: u64,
    items: HashMap<EntityType, Vec<Value>>,
}

/// A scripted backend.
#[derive(Debug)]
pub struct MockBackend {
    name: &'static str,
    id_prefix: String,
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Creates a mock whose created ids are `{id_prefix}{n}`, starting at 1.
    pub fn new(name: &'static str, id_prefix: impl Into<String>) -> Self {
        Self {
            name,
            id_prefix: id_prefix.into(),
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every call of `op` fail with `message`.
    pub fn fail(&self, op: MockOp, message: impl Into<String>) {
        self.state().failures.insert(op, message.into());
    }

    /// Makes every call fail with `message`.
    pub fn fail_everything(&self, message: impl Into<String>) {
        self.state().fail_all = Some(message.into());
    }

    /// Clears all scripted failures.
    pub fn recover(&self) {
        let mut state = self.state();
        state.failures.clear();
        state.fail_all = None;
    }

    /// Sets what `list` returns for an entity type.
    pub fn set_items(&self, entity: EntityType, items: Vec<Value>) {
        self.state().items.insert(entity, items);
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, op: MockOp) -> usize {
        self.state().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.len()
    }

    /// The most recent call of `op`.
    pub fn last_call(&self, op: MockOp) -> Option<MockCall> {
        self.state().calls.iter().rev().find(|c| c.op == op).cloned()
    }

    fn record(&self, call: MockCall) -> ClientResult<()> {
        let mut state = self.state();
        let op = call.op;
        state.calls.push(call);

        if let Some(message) = state.fail_all.as_ref().or_else(|| state.failures.get(&op)) {
            return Err(ClientError::Status {
                status: 503,
                body: message.clone(),
            });
        }
        Ok(())
    }

    fn call(op: MockOp, entity: Option<EntityType>, id: Option<&str>) -> MockCall {
        MockCall {
            op,
            entity,
            id: id.map(str::to_owned),
            cross_ref: None,
            payload: Payload::new(),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn create(
        &self,
        entity: EntityType,
        payload: &Payload,
        cross_ref: Option<&str>,
    ) -> ClientResult<Value> {
        self.record(MockCall {
            cross_ref: cross_ref.map(str::to_owned),
            payload: payload.clone(),
            ..Self::call(MockOp::Create, Some(entity), None)
        })?;

        let id = {
            let mut state = self.state();
            state.next_id += 1;
            format!("{}{}", self.id_prefix, state.next_id)
        };
        let mut created = payload.clone();
        created.insert("id".into(), Value::String(id));
        if let Some(reference) = cross_ref {
            created.insert("cross_ref".into(), Value::String(reference.into()));
        }
        Ok(Value::Object(created))
    }

    async fn update(&self, entity: EntityType, id: &str, payload: &Payload) -> ClientResult<Value> {
        self.record(MockCall {
            payload: payload.clone(),
            ..Self::call(MockOp::Update, Some(entity), Some(id))
        })?;

        let mut updated = payload.clone();
        updated.insert("id".into(), Value::String(id.into()));
        Ok(Value::Object(updated))
    }

    async fn delete(&self, entity: EntityType, id: &str) -> ClientResult<()> {
        self.record(Self::call(MockOp::Delete, Some(entity), Some(id)))
    }

    async fn list(&self, entity: EntityType, _filters: &ListFilters) -> ClientResult<Vec<Value>> {
        self.record(Self::call(MockOp::List, Some(entity), None))?;
        Ok(self.state().items.get(&entity).cloned().unwrap_or_default())
    }

    async fn connect(&self, thing_id: &str, channel_id: &str) -> ClientResult<Value> {
        let key = format!("{thing_id}:{channel_id}");
        self.record(Self::call(MockOp::Connect, Some(EntityType::Connection), Some(&key)))?;
        Ok(json!({ "thing_id": thing_id, "channel_id": channel_id }))
    }

    async fn disconnect(&self, thing_id: &str, channel_id: &str) -> ClientResult<()> {
        let key = format!("{thing_id}:{channel_id}");
        self.record(Self::call(MockOp::Disconnect, Some(EntityType::Connection), Some(&key)))
    }

    async fn health(&self) -> ClientResult<()> {
        self.record(Self::call(MockOp::Health, None, None))
    }
}
