mod common;

use common::{config, harness};
use fleetsync_client::ListFilters;
use fleetsync_client::mock::MockOp;
use fleetsync_dualwrite::offline;
use fleetsync_dualwrite::{DualWriteConfig, ReadSource};
use fleetsync_types::{EntityType, SystemId};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn reads_come_from_preferred_system() {
    let h = harness(DualWriteConfig::default());
    h.primary
        .set_items(EntityType::Thing, vec![json!({"id": "t1", "name": "meter"})]);
    h.secondary
        .set_items(EntityType::Thing, vec![json!({"id": "s1", "name": "backup"})]);

    let outcome = h.service.get(EntityType::Thing, &ListFilters::default()).await;
    assert_eq!(outcome.source, ReadSource::Primary);
    assert_eq!(outcome.items, vec![json!({"id": "t1", "name": "meter"})]);
    assert_eq!(h.secondary.call_count(MockOp::List), 0);
}

#[tokio::test]
async fn reads_prefer_secondary_when_configured() {
    let h = harness(config(true, true));
    h.secondary
        .set_items(EntityType::Channel, vec![json!({"id": "s1"})]);

    let channels = h.service.get_channels(&ListFilters::default()).await;
    assert_eq!(channels, vec![json!({"id": "s1"})]);
    assert_eq!(h.primary.call_count(MockOp::List), 0);
}

#[tokio::test]
async fn reads_fall_back_to_other_system() {
    let h = harness(DualWriteConfig::default());
    h.primary.fail(MockOp::List, "timeout");
    h.secondary
        .set_items(EntityType::LoRaWanDevice, vec![json!({"thing_id": "t1"})]);

    let outcome = h
        .service
        .get(EntityType::LoRaWanDevice, &ListFilters::default())
        .await;
    assert_eq!(outcome.source, ReadSource::Secondary);
    assert_eq!(outcome.items, vec![json!({"thing_id": "t1"})]);
}

#[tokio::test]
async fn reads_serve_placeholders_when_both_fail() {
    let h = harness(DualWriteConfig::default());
    h.primary.fail_everything("down");
    h.secondary.fail_everything("down");

    let outcome = h.service.get(EntityType::Thing, &ListFilters::default()).await;
    assert_eq!(outcome.source, ReadSource::Offline);
    assert_eq!(outcome.items, offline::placeholder(EntityType::Thing));
    assert!(!outcome.items.is_empty());
    assert!(outcome.items.iter().all(offline::is_placeholder));

    let connections = h.service.get_connections(&ListFilters::default()).await;
    assert!(connections.is_empty());
}

#[tokio::test]
async fn reads_without_fallback_skip_the_other_system() {
    let h = harness(config(false, false));
    h.primary.fail(MockOp::List, "down");

    let things = h.service.get_things(&ListFilters::default()).await;
    assert_eq!(things, offline::placeholder(EntityType::Thing));
    assert_eq!(h.secondary.call_count(MockOp::List), 0);
}

#[tokio::test]
async fn empty_list_is_not_a_failure() {
    let h = harness(DualWriteConfig::default());

    let outcome = h.service.get(EntityType::Channel, &ListFilters::default()).await;
    assert_eq!(outcome.source, ReadSource::Primary);
    assert!(outcome.items.is_empty());
}

#[tokio::test]
async fn status_reports_both_systems() {
    let h = harness(config(true, false));
    h.primary.fail(MockOp::Health, "connection refused");

    let status = h.service.system_status().await;
    assert!(!status.primary.available);
    assert!(status.primary.error.as_deref().unwrap().contains("connection refused"));
    assert!(status.secondary.available);
    assert_eq!(status.secondary.error, None);
    assert!(!status.fallback_enabled);
    assert_eq!(status.preferred_system, SystemId::Secondary);
    assert!(status.any_available());
}

#[tokio::test]
async fn status_never_fails_when_everything_is_down() {
    let h = harness(DualWriteConfig::default());
    h.primary.fail_everything("down");
    h.secondary.fail_everything("down");

    let status = h.service.system_status().await;
    assert!(!status.any_available());
    assert!(status.fallback_enabled);
    assert_eq!(status.preferred_system, SystemId::Primary);
    assert_eq!(h.primary.call_count(MockOp::Health), 1);
    assert_eq!(h.secondary.call_count(MockOp::Health), 1);
}
