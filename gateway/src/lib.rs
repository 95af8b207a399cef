//! HTTP API in front of the fleetsync dual-write core.
//!
//! Dashboard views call these endpoints instead of talking to either
//! backing system directly. Writes go through the orchestrator; reads never
//! fail and report which system (or the offline placeholder set) served them.

mod config;

pub use config::GatewayConfig;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use fleetsync_client::ListFilters;
use fleetsync_dualwrite::{
    DualWriteError, DualWriteService, ReadOutcome, SyncSummary, SystemStatus, Written,
};
use fleetsync_types::{EntityType, OperationRequest, Payload, SystemId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Shared handler state.
pub type AppState = Arc<DualWriteService>;

/// Body of every successful write.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WriteResponse {
    pub data: Value,
    pub source: SystemId,
}

impl From<Written> for WriteResponse {
    fn from(written: Written) -> Self {
        let source = written.system();
        Self {
            data: written.into_payload(),
            source,
        }
    }
}

/// Error returned by a handler, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Write(DualWriteError),
}

impl From<DualWriteError> for ApiError {
    fn from(e: DualWriteError) -> Self {
        ApiError::Write(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Write(e) => {
                let status = match &e {
                    DualWriteError::Validation(_) => StatusCode::BAD_REQUEST,
                    DualWriteError::SystemUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    DualWriteError::CombinedFailure { .. } => StatusCode::BAD_GATEWAY,
                };
                if !e.is_validation() {
                    warn!("Write failed: {e}");
                }
                (status, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Turns query parameters into list filters. `offset` and `limit` must be
/// non-negative integers; everything else is passed through.
fn list_filters(mut query: BTreeMap<String, String>) -> ApiResult<ListFilters> {
    let mut number = |key: &str| -> ApiResult<Option<u64>> {
        query
            .remove(key)
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|_| ApiError::BadRequest(format!("`{key}` must be a non-negative integer")))
            })
            .transpose()
    };
    let offset = number("offset")?;
    let limit = number("limit")?;

    Ok(ListFilters {
        offset,
        limit,
        params: query,
    })
}

async fn status_handler(State(service): State<AppState>) -> Json<SystemStatus> {
    Json(service.system_status().await)
}

async fn sync_handler(State(service): State<AppState>) -> Json<SyncSummary> {
    Json(service.sync_data().await)
}

async fn list_handler(
    State(service): State<AppState>,
    Extension(entity): Extension<EntityType>,
    Query(query): Query<BTreeMap<String, String>>,
) -> ApiResult<Json<ReadOutcome>> {
    let filters = list_filters(query)?;
    Ok(Json(service.get(entity, &filters).await))
}

async fn create_handler(
    State(service): State<AppState>,
    Extension(entity): Extension<EntityType>,
    Json(payload): Json<Payload>,
) -> ApiResult<(StatusCode, Json<WriteResponse>)> {
    let written = service.write(OperationRequest::create(entity, payload)).await?;
    Ok((StatusCode::CREATED, Json(written.into())))
}

async fn update_handler(
    State(service): State<AppState>,
    Extension(entity): Extension<EntityType>,
    Path(id): Path<String>,
    Json(payload): Json<Payload>,
) -> ApiResult<Json<WriteResponse>> {
    let written = service.write(OperationRequest::update(entity, id, payload)).await?;
    Ok(Json(written.into()))
}

async fn delete_handler(
    State(service): State<AppState>,
    Extension(entity): Extension<EntityType>,
    Path(id): Path<String>,
) -> ApiResult<Json<WriteResponse>> {
    let written = service.write(OperationRequest::delete(entity, id)).await?;
    Ok(Json(written.into()))
}

async fn connections_handler(
    State(service): State<AppState>,
    Query(query): Query<BTreeMap<String, String>>,
) -> ApiResult<Json<ReadOutcome>> {
    let filters = list_filters(query)?;
    Ok(Json(service.get(EntityType::Connection, &filters).await))
}

async fn connect_handler(
    State(service): State<AppState>,
    Path((channel_id, thing_id)): Path<(String, String)>,
) -> ApiResult<Json<WriteResponse>> {
    let written = service.connect_thing_to_channel(&thing_id, &channel_id).await?;
    Ok(Json(written.into()))
}

async fn disconnect_handler(
    State(service): State<AppState>,
    Path((channel_id, thing_id)): Path<(String, String)>,
) -> ApiResult<Json<WriteResponse>> {
    let written = service
        .disconnect_thing_from_channel(&thing_id, &channel_id)
        .await?;
    Ok(Json(written.into()))
}

/// CRUD routes for one entity collection.
fn entity_routes(entity: EntityType) -> Router<AppState> {
    Router::new()
        .route("/", get(list_handler).post(create_handler))
        .route("/{id}", put(update_handler).delete(delete_handler))
        .layer(Extension(entity))
}

/// Build the HTTP API router around a dual-write service.
pub fn build_router(service: AppState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/sync", post(sync_handler))
        .nest("/api/v1/things", entity_routes(EntityType::Thing))
        .nest("/api/v1/channels", entity_routes(EntityType::Channel))
        .nest("/api/v1/lorawan-devices", entity_routes(EntityType::LoRaWanDevice))
        .route("/api/v1/connections", get(connections_handler))
        .route(
            "/api/v1/channels/{id}/things/{thing_id}",
            put(connect_handler).delete(disconnect_handler),
        )
        .with_state(service)
}
