//! The capability set shared by both backing systems.

use crate::error::ClientResult;
use async_trait::async_trait;
use fleetsync_types::{EntityType, Payload};
use serde_json::Value;
use std::collections::BTreeMap;

/// Query filters for list calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilters {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    /// Free-form filters passed through as query parameters.
    pub params: BTreeMap<String, String>,
}

impl ListFilters {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn page(mut self, offset: u64, limit: u64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Flattens the filters into query pairs.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = Vec::with_capacity(self.params.len() + 2);
        if let Some(offset) = self.offset {
            query.push(("offset".into(), offset.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit".into(), limit.to_string()));
        }
        query.extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        query
    }
}

/// One backing system.
///
/// `create` takes an optional cross reference: the id the other system
/// assigned to the same logical entity, so the two records can be
/// correlated later.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    async fn create(
        &self,
        entity: EntityType,
        payload: &Payload,
        cross_ref: Option<&str>,
    ) -> ClientResult<Value>;

    async fn update(&self, entity: EntityType, id: &str, payload: &Payload) -> ClientResult<Value>;

    async fn delete(&self, entity: EntityType, id: &str) -> ClientResult<()>;

    async fn list(&self, entity: EntityType, filters: &ListFilters) -> ClientResult<Vec<Value>>;

    async fn connect(&self, thing_id: &str, channel_id: &str) -> ClientResult<Value>;

    async fn disconnect(&self, thing_id: &str, channel_id: &str) -> ClientResult<()>;

    /// Checks the system's health endpoint.
    async fn health(&self) -> ClientResult<()>;
}
