//! Create-then-mutate flows against both real HTTP clients.

use fleetsync_client::{PrimaryClient, PrimaryConfig, SecondaryClient, SecondaryConfig};
use fleetsync_dualwrite::{DualWriteConfig, DualWriteService, MemorySyncLog, Written};
use fleetsync_types::{EntityType, OperationRequest, Payload};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap()
}

struct Servers {
    platform: MockServer,
    backup: MockServer,
    log: Arc<MemorySyncLog>,
    service: DualWriteService,
}

async fn servers(config: DualWriteConfig) -> Servers {
    let platform = MockServer::start().await;
    let backup = MockServer::start().await;
    let log = Arc::new(MemorySyncLog::new());

    let primary = PrimaryClient::new(PrimaryConfig {
        base_url: platform.uri(),
        token: Some("tok".into()),
        timeout_secs: 5,
    })
    .unwrap();
    let secondary = SecondaryClient::new(SecondaryConfig {
        base_url: backup.uri(),
        api_key: None,
        timeout_secs: 5,
    })
    .unwrap();
    let service = DualWriteService::new(Arc::new(primary), Arc::new(secondary), log.clone(), config);

    Servers {
        platform,
        backup,
        log,
        service,
    }
}

#[tokio::test]
async fn backup_record_answers_to_platform_id() {
    let s = servers(DualWriteConfig::default()).await;
    Mock::given(method("POST"))
        .and(path("/things"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "t1", "name": "meter"})))
        .expect(1)
        .mount(&s.platform)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/things"))
        .and(body_partial_json(json!({"id": "t1", "remote_id": "t1"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "t1", "name": "meter", "remote_id": "t1"}
        })))
        .expect(1)
        .mount(&s.backup)
        .await;
    Mock::given(method("PUT"))
        .and(path("/things/t1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&s.platform)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/things/t1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&s.backup)
        .await;

    let created = s.service.create_thing(payload(json!({"name": "meter"}))).await.unwrap();
    let id = created.payload()["id"].as_str().unwrap().to_string();
    let result = s
        .service
        .execute(&OperationRequest::update(
            EntityType::Thing,
            id,
            payload(json!({"name": "renamed"})),
        ))
        .await
        .unwrap();

    assert!(result.both_succeeded());
    assert!(s.log.entries().unwrap().iter().all(|e| e.failed_system.is_none()));
}

#[tokio::test]
async fn platform_record_is_found_by_backup_id() {
    let s = servers(DualWriteConfig {
        prefer_secondary: true,
        fallback_enabled: true,
    })
    .await;
    Mock::given(method("POST"))
        .and(path("/api/channels"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "s1"}})))
        .expect(1)
        .mount(&s.backup)
        .await;
    Mock::given(method("POST"))
        .and(path("/channels"))
        .and(body_partial_json(json!({"metadata": {"backup_id": "s1"}})))
        .respond_with(ResponseTemplate::new(201).insert_header("Location", "/channels/c7"))
        .expect(1)
        .mount(&s.platform)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/channels/s1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&s.backup)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/channels/s1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&s.platform)
        .await;
    Mock::given(method("GET"))
        .and(path("/channels"))
        .and(query_param("metadata", r#"{"backup_id":"s1"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"channels": [{"id": "c7"}]})))
        .mount(&s.platform)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/channels/c7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&s.platform)
        .await;

    let created = s.service.create_channel(payload(json!({"name": "alarms"}))).await.unwrap();
    assert_eq!(created, Written::Secondary(json!({"id": "s1"})));

    let deleted = s.service.delete_channel("s1").await.unwrap();
    assert_eq!(deleted, Written::Secondary(Value::Null));
    assert!(s.log.entries().unwrap().iter().all(|e| e.failed_system.is_none()));
}
