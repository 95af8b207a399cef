//! Secondary system client: the database-backed backup API.
//!
//! Every entity has a table-like resource under `/api`. A cross reference
//! to the primary's id is stored as `remote_id`, except for LoRaWAN device
//! details, which are keyed by the primary's `thing_id`.
//!
//! A record created with a cross reference adopts it as its own `id`, and
//! LoRaWAN detail routes take the `thing_id`. Both systems therefore answer
//! to the id the primary assigned.

use crate::backend::{Backend, ListFilters};
use crate::error::{ClientError, ClientResult};
use crate::http::{echo_with_id, ensure_success, extract_list, read_json};
use async_trait::async_trait;
use fleetsync_types::{EntityType, Payload};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const API_KEY_HEADER: &str = "x-api-key";

/// Secondary system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryConfig {
    /// Base URL of the backup API (e.g. `http://localhost:3001`).
    pub base_url: String,
    /// Optional API key sent as `x-api-key`.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// HTTP client for the backup API.
pub struct SecondaryClient {
    config: SecondaryConfig,
    client: Client,
}

impl SecondaryClient {
    /// Creates a new client. Fails only if the HTTP client cannot be built.
    pub fn new(config: SecondaryConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SecondaryConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.config.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    const fn resource(entity: EntityType) -> &'static str {
        match entity {
            EntityType::Thing => "things",
            EntityType::Channel => "channels",
            EntityType::Connection => "connections",
            EntityType::LoRaWanDevice => "lorawan-devices",
        }
    }

    const fn cross_ref_field(entity: EntityType) -> &'static str {
        match entity {
            EntityType::LoRaWanDevice => "thing_id",
            _ => "remote_id",
        }
    }

    /// The backup API wraps some responses in `{"data": ...}`.
    fn unwrap_data(body: Value) -> Value {
        match body {
            Value::Object(mut map) if map.contains_key("data") => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        }
    }

    fn reject_connection(entity: EntityType) -> ClientResult<()> {
        if entity == EntityType::Connection {
            return Err(ClientError::Unsupported(
                "connections are managed through connect/disconnect".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for SecondaryClient {
    fn name(&self) -> &'static str {
        "secondary"
    }

    async fn create(
        &self,
        entity: EntityType,
        payload: &Payload,
        cross_ref: Option<&str>,
    ) -> ClientResult<Value> {
        Self::reject_connection(entity)?;

        let mut body = payload.clone();
        if let Some(reference) = cross_ref {
            body.insert(
                Self::cross_ref_field(entity).into(),
                Value::String(reference.into()),
            );
            if entity != EntityType::LoRaWanDevice {
                body.insert("id".into(), Value::String(reference.into()));
            }
        }
        debug!(%entity, ?cross_ref, "Creating on secondary");

        let response = self
            .request(Method::POST, &format!("/{}", Self::resource(entity)))
            .json(&body)
            .send()
            .await?;
        let returned = Self::unwrap_data(read_json(ensure_success(response).await?).await?);
        Ok(echo_with_id(returned, None, &body))
    }

    async fn update(&self, entity: EntityType, id: &str, payload: &Payload) -> ClientResult<Value> {
        Self::reject_connection(entity)?;

        let response = self
            .request(Method::PUT, &format!("/{}/{id}", Self::resource(entity)))
            .json(payload)
            .send()
            .await?;
        let returned = Self::unwrap_data(read_json(ensure_success(response).await?).await?);
        Ok(echo_with_id(returned, Some(id), payload))
    }

    async fn delete(&self, entity: EntityType, id: &str) -> ClientResult<()> {
        Self::reject_connection(entity)?;

        let response = self
            .request(Method::DELETE, &format!("/{}/{id}", Self::resource(entity)))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn list(&self, entity: EntityType, filters: &ListFilters) -> ClientResult<Vec<Value>> {
        let response = self
            .request(Method::GET, &format!("/{}", Self::resource(entity)))
            .query(&filters.to_query())
            .send()
            .await?;
        let body = read_json(ensure_success(response).await?).await?;
        extract_list(body, "data")
    }

    async fn connect(&self, thing_id: &str, channel_id: &str) -> ClientResult<Value> {
        let body = json!({ "thing_id": thing_id, "channel_id": channel_id });
        let response = self
            .request(Method::POST, "/connections")
            .json(&body)
            .send()
            .await?;
        let returned = Self::unwrap_data(read_json(ensure_success(response).await?).await?);
        if returned.is_null() {
            return Ok(body);
        }
        Ok(returned)
    }

    async fn disconnect(&self, thing_id: &str, channel_id: &str) -> ClientResult<()> {
        let response = self
            .request(Method::DELETE, "/connections")
            .query(&[("thing_id", thing_id), ("channel_id", channel_id)])
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn health(&self) -> ClientResult<()> {
        let response = self.request(Method::GET, "/health").send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}
