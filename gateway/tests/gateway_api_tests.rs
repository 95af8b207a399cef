use fleetsync_client::mock::{MockBackend, MockOp};
use fleetsync_dualwrite::{
    DualWriteConfig, DualWriteService, MemorySyncLog, ReadOutcome, ReadSource, SystemStatus,
};
use fleetsync_gateway::{WriteResponse, build_router};
use fleetsync_types::{EntityType, SyncStatus, SystemId};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

struct TestServer {
    base: String,
    primary: Arc<MockBackend>,
    secondary: Arc<MockBackend>,
    log: Arc<MemorySyncLog>,
    http: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Spin up the HTTP server on an OS-assigned port around mock backends.
async fn spawn_test_server(config: DualWriteConfig) -> TestServer {
    let primary = Arc::new(MockBackend::new("primary", "t"));
    let secondary = Arc::new(MockBackend::new("secondary", "s"));
    let log = Arc::new(MemorySyncLog::new());
    let service = Arc::new(DualWriteService::new(
        primary.clone(),
        secondary.clone(),
        log.clone(),
        config,
    ));

    let app = build_router(service);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        primary,
        secondary,
        log,
        http: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn create_thing_returns_primary_payload() {
    let server = spawn_test_server(DualWriteConfig::default()).await;
    let resp = server
        .http
        .post(server.url("/api/v1/things"))
        .json(&json!({"name": "meter"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 201);
    let body: WriteResponse = resp.json().await.unwrap();
    assert_eq!(
        body,
        WriteResponse {
            data: json!({"id": "t1", "name": "meter"}),
            source: SystemId::Primary,
        }
    );
    assert_eq!(
        server.secondary.last_call(MockOp::Create).unwrap().cross_ref.as_deref(),
        Some("t1")
    );
}

#[tokio::test]
async fn create_reports_fallback_source() {
    let server = spawn_test_server(DualWriteConfig::default()).await;
    server.primary.fail(MockOp::Create, "platform down");

    let resp = server
        .http
        .post(server.url("/api/v1/channels"))
        .json(&json!({"name": "telemetry"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 201);
    let body: WriteResponse = resp.json().await.unwrap();
    assert_eq!(body.source, SystemId::Secondary);
    assert_eq!(body.data["id"], json!("s1"));
}

#[tokio::test]
async fn update_and_delete_route_the_id() {
    let server = spawn_test_server(DualWriteConfig::default()).await;

    let resp = server
        .http
        .put(server.url("/api/v1/lorawan-devices/t9"))
        .json(&json!({"dev_eui": "AA"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let update = server.secondary.last_call(MockOp::Update).unwrap();
    assert_eq!(update.entity, Some(EntityType::LoRaWanDevice));
    assert_eq!(update.id.as_deref(), Some("t9"));

    let resp = server
        .http
        .delete(server.url("/api/v1/things/t3"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: WriteResponse = resp.json().await.unwrap();
    assert_eq!(body.data, Value::Null);
    assert_eq!(
        server.primary.last_call(MockOp::Delete).unwrap().id.as_deref(),
        Some("t3")
    );
}

#[tokio::test]
async fn connect_and_disconnect_thing() {
    let server = spawn_test_server(DualWriteConfig::default()).await;

    let resp = server
        .http
        .put(server.url("/api/v1/channels/c1/things/t1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: WriteResponse = resp.json().await.unwrap();
    assert_eq!(body.data, json!({"thing_id": "t1", "channel_id": "c1"}));

    let resp = server
        .http
        .delete(server.url("/api/v1/channels/c1/things/t1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(server.secondary.call_count(MockOp::Disconnect), 1);
}

#[tokio::test]
async fn combined_failure_is_bad_gateway() {
    let server = spawn_test_server(DualWriteConfig::default()).await;
    server.primary.fail_everything("platform down");
    server.secondary.fail_everything("db down");

    let resp = server
        .http
        .delete(server.url("/api/v1/channels/c1"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("primary") && message.contains("secondary"));
}

#[tokio::test]
async fn unavailable_without_fallback_is_503() {
    let server = spawn_test_server(DualWriteConfig {
        prefer_secondary: false,
        fallback_enabled: false,
    })
    .await;
    server.primary.fail(MockOp::Create, "platform down");

    let resp = server
        .http
        .post(server.url("/api/v1/things"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
    assert_eq!(server.secondary.total_calls(), 0);
}

#[tokio::test]
async fn invalid_update_is_400_and_touches_nothing() {
    let server = spawn_test_server(DualWriteConfig::default()).await;

    let resp = server
        .http
        .put(server.url("/api/v1/things/t1"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
    assert_eq!(server.primary.total_calls() + server.secondary.total_calls(), 0);
}

#[tokio::test]
async fn list_reports_source_and_falls_back_to_placeholders() {
    let server = spawn_test_server(DualWriteConfig::default()).await;
    server
        .primary
        .set_items(EntityType::Thing, vec![json!({"id": "t1"})]);

    let outcome: ReadOutcome = reqwest::get(server.url("/api/v1/things?limit=10&name=meter"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome.source, ReadSource::Primary);
    assert_eq!(outcome.items, vec![json!({"id": "t1"})]);

    server.primary.fail_everything("down");
    server.secondary.fail_everything("down");
    let resp = reqwest::get(server.url("/api/v1/channels")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let outcome: ReadOutcome = resp.json().await.unwrap();
    assert_eq!(outcome.source, ReadSource::Offline);
    assert!(outcome.items.iter().all(|item| item["offline"] == json!(true)));
}

#[tokio::test]
async fn bad_paging_is_400() {
    let server = spawn_test_server(DualWriteConfig::default()).await;
    let resp = reqwest::get(server.url("/api/v1/connections?offset=-1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn status_endpoint_reports_availability() {
    let server = spawn_test_server(DualWriteConfig::default()).await;
    server.secondary.fail(MockOp::Health, "db down");

    let status: SystemStatus = reqwest::get(server.url("/api/v1/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(status.primary.available);
    assert!(!status.secondary.available);
    assert_eq!(status.preferred_system, SystemId::Primary);
}

#[tokio::test]
async fn sync_endpoint_resolves_pending_entries() {
    let server = spawn_test_server(DualWriteConfig::default()).await;
    server.secondary.fail(MockOp::Create, "timeout");
    server
        .http
        .post(server.url("/api/v1/things"))
        .json(&json!({"name": "meter"}))
        .send()
        .await
        .unwrap();
    server.secondary.recover();

    let summary: Value = server
        .http
        .post(server.url("/api/v1/sync"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(summary["attempted"], json!(1));
    assert_eq!(summary["resolved"], json!({"thing": 1}));
    assert_eq!(summary["errors"], json!([]));
    assert_eq!(server.log.entries().unwrap()[0].status, SyncStatus::Resolved);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let server = spawn_test_server(DualWriteConfig::default()).await;
    let resp = reqwest::get(server.url("/api/v1/nonexistent")).await.unwrap();
    assert_eq!(resp.status(), 404);
}
