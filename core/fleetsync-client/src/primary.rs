//! Primary system client: the IoT platform REST API.
//!
//! Things and channels live under `/things` and `/channels`. LoRaWAN
//! devices are things tagged with `metadata.type = "lorawan"`.
//! Connections are `PUT`/`DELETE /channels/{channel}/things/{thing}`.
//!
//! Records created here after the backup API keep the backup id in
//! `metadata.backup_id`. Updates and deletes addressed by that id are
//! redirected to the platform's own id.

use crate::backend::{Backend, ListFilters};
use crate::error::{ClientError, ClientResult};
use crate::http::{echo_with_id, ensure_success, extract_list, id_from_location, read_json};
use async_trait::async_trait;
use fleetsync_types::{EntityType, Payload};
use reqwest::header::LOCATION;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

const LORAWAN_TYPE: &str = "lorawan";

/// Primary system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    /// Base URL of the platform API (e.g. `http://localhost:9000`).
    pub base_url: String,
    /// Pre-issued access token, if any.
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "access_token")]
    token: String,
}

/// HTTP client for the IoT platform.
pub struct PrimaryClient {
    config: PrimaryConfig,
    client: Client,
    token: Arc<RwLock<Option<String>>>,
}

impl PrimaryClient {
    /// Creates a new client. Fails only if the HTTP client cannot be built.
    pub fn new(config: PrimaryConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let token = Arc::new(RwLock::new(config.token.clone()));

        Ok(Self {
            config,
            client,
            token,
        })
    }

    pub fn config(&self) -> &PrimaryConfig {
        &self.config
    }

    /// Replaces the access token (e.g. one restored from settings).
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Exchanges user credentials for an access token and keeps it.
    pub async fn authenticate(&self, email: &str, password: &str) -> ClientResult<()> {
        debug!("Requesting platform access token");

        let response = self
            .client
            .post(self.url("/tokens"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::AuthFailed(format!("HTTP {status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClientError::AuthFailed(format!("failed to parse token response: {e}")))?;

        *self.token.write().await = Some(token.token);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn collection(entity: EntityType) -> ClientResult<&'static str> {
        match entity {
            EntityType::Thing | EntityType::LoRaWanDevice => Ok("things"),
            EntityType::Channel => Ok("channels"),
            EntityType::Connection => Err(ClientError::Unsupported(
                "connections are managed through connect/disconnect".into(),
            )),
        }
    }

    /// The create body: LoRaWAN devices get their type tag, and a cross
    /// reference from the backup system is kept in metadata.
    fn create_body(entity: EntityType, payload: &Payload, cross_ref: Option<&str>) -> Payload {
        let mut body = payload.clone();
        if entity != EntityType::LoRaWanDevice && cross_ref.is_none() {
            return body;
        }

        let metadata = body
            .entry("metadata")
            .or_insert_with(|| Value::Object(Payload::new()));
        if !metadata.is_object() {
            *metadata = Value::Object(Payload::new());
        }
        if let Value::Object(meta) = metadata {
            if entity == EntityType::LoRaWanDevice {
                meta.insert("type".into(), Value::String(LORAWAN_TYPE.into()));
            }
            if let Some(reference) = cross_ref {
                meta.insert("backup_id".into(), Value::String(reference.into()));
            }
        }
        body
    }

    /// The platform id of the record whose `metadata.backup_id` is `backup_id`.
    async fn find_by_backup_id(
        &self,
        collection: &str,
        backup_id: &str,
    ) -> ClientResult<Option<String>> {
        let response = self
            .request(Method::GET, &format!("/{collection}"))
            .await
            .query(&[("metadata", json!({ "backup_id": backup_id }).to_string())])
            .send()
            .await?;
        let body = read_json(ensure_success(response).await?).await?;
        let found = extract_list(body, collection)?
            .into_iter()
            .find_map(|item| match item.get("id")? {
                Value::String(id) => Some(id.clone()),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            });
        Ok(found)
    }

    async fn record_request(
        &self,
        method: Method,
        collection: &str,
        id: &str,
        body: Option<&Payload>,
    ) -> ClientResult<Response> {
        let builder = self.request(method, &format!("/{collection}/{id}")).await;
        let builder = match body {
            Some(body) => builder.json(body),
            None => builder,
        };
        Ok(builder.send().await?)
    }

    /// Sends `method` to one record. A 404 is retried once against the
    /// record that carries `id` as its backup id. Returns the id that
    /// answered along with the response.
    async fn send_to_record(
        &self,
        method: Method,
        collection: &str,
        id: &str,
        body: Option<&Payload>,
    ) -> ClientResult<(String, Response)> {
        let response = self.record_request(method.clone(), collection, id, body).await?;
        if response.status() != StatusCode::NOT_FOUND {
            return Ok((id.to_string(), response));
        }

        match self.find_by_backup_id(collection, id).await {
            Ok(Some(local)) if local != id => {
                debug!(backup_id = %id, %local, "Redirecting to platform id");
                let response = self.record_request(method, collection, &local, body).await?;
                Ok((local, response))
            }
            Ok(_) => Ok((id.to_string(), response)),
            Err(e) => {
                debug!(backup_id = %id, "Backup id lookup failed: {e}");
                Ok((id.to_string(), response))
            }
        }
    }

    async fn list_connections(&self, filters: &ListFilters) -> ClientResult<Vec<Value>> {
        let (path, key) = match (filters.get("thing_id"), filters.get("channel_id")) {
            (Some(thing), _) => (format!("/things/{thing}/channels"), "channels"),
            (None, Some(channel)) => (format!("/channels/{channel}/things"), "things"),
            (None, None) => {
                return Err(ClientError::InvalidRequest(
                    "listing connections requires `thing_id` or `channel_id`".into(),
                ));
            }
        };

        let mut page = filters.clone();
        page.params.remove("thing_id");
        page.params.remove("channel_id");

        let response = self
            .request(Method::GET, &path)
            .await
            .query(&page.to_query())
            .send()
            .await?;
        let body = read_json(ensure_success(response).await?).await?;
        extract_list(body, key)
    }
}

#[async_trait]
impl Backend for PrimaryClient {
    fn name(&self) -> &'static str {
        "primary"
    }

    async fn create(
        &self,
        entity: EntityType,
        payload: &Payload,
        cross_ref: Option<&str>,
    ) -> ClientResult<Value> {
        let collection = Self::collection(entity)?;
        let body = Self::create_body(entity, payload, cross_ref);
        debug!(%entity, "Creating on primary");

        let response = self
            .request(Method::POST, &format!("/{collection}"))
            .await
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let returned = read_json(response).await?;
        let id = location.as_deref().and_then(id_from_location);

        Ok(echo_with_id(returned, id, &body))
    }

    async fn update(&self, entity: EntityType, id: &str, payload: &Payload) -> ClientResult<Value> {
        let collection = Self::collection(entity)?;
        let (target, response) = self
            .send_to_record(Method::PUT, collection, id, Some(payload))
            .await?;
        let returned = read_json(ensure_success(response).await?).await?;
        Ok(echo_with_id(returned, Some(&target), payload))
    }

    async fn delete(&self, entity: EntityType, id: &str) -> ClientResult<()> {
        let collection = Self::collection(entity)?;
        let (_, response) = self
            .send_to_record(Method::DELETE, collection, id, None)
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn list(&self, entity: EntityType, filters: &ListFilters) -> ClientResult<Vec<Value>> {
        if entity == EntityType::Connection {
            return self.list_connections(filters).await;
        }

        let collection = Self::collection(entity)?;
        let mut query = filters.to_query();
        if entity == EntityType::LoRaWanDevice {
            query.push((
                "metadata".into(),
                json!({ "type": LORAWAN_TYPE }).to_string(),
            ));
        }

        let response = self
            .request(Method::GET, &format!("/{collection}"))
            .await
            .query(&query)
            .send()
            .await?;
        let body = read_json(ensure_success(response).await?).await?;
        extract_list(body, collection)
    }

    async fn connect(&self, thing_id: &str, channel_id: &str) -> ClientResult<Value> {
        let response = self
            .request(Method::PUT, &format!("/channels/{channel_id}/things/{thing_id}"))
            .await
            .send()
            .await?;
        let returned = read_json(ensure_success(response).await?).await?;
        if returned.is_null() {
            return Ok(json!({ "thing_id": thing_id, "channel_id": channel_id }));
        }
        Ok(returned)
    }

    async fn disconnect(&self, thing_id: &str, channel_id: &str) -> ClientResult<()> {
        let response = self
            .request(Method::DELETE, &format!("/channels/{channel_id}/things/{thing_id}"))
            .await
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn health(&self) -> ClientResult<()> {
        let response = self.client.get(self.url("/health")).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}
