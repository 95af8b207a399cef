use fleetsync_types::{EntityType, OperationKind, OperationRequest, Payload};
use proptest::prelude::*;
use serde_json::json;
use std::str::FromStr;

fn payload(value: serde_json::Value) -> Payload {
    value.as_object().cloned().unwrap()
}

// ── EntityType ──────────────────────────────────────────────────

#[test]
fn table_names_roundtrip() {
    for entity in EntityType::ALL {
        assert_eq!(EntityType::from_table_name(entity.table_name()), Some(entity));
    }
    assert_eq!(EntityType::from_table_name("gateways"), None);
}

#[test]
fn entity_type_display_and_parse() {
    assert_eq!(EntityType::LoRaWanDevice.to_string(), "lorawan_device");
    assert_eq!(EntityType::from_str("channel").unwrap(), EntityType::Channel);
    assert!(EntityType::from_str("gateway").is_err());
}

#[test]
fn entity_type_serializes_snake_case() {
    let json = serde_json::to_string(&EntityType::LoRaWanDevice).unwrap();
    assert_eq!(json, "\"lorawan_device\"");
    let parsed: EntityType = serde_json::from_str("\"thing\"").unwrap();
    assert_eq!(parsed, EntityType::Thing);
}

#[test]
fn only_lorawan_is_composite() {
    assert!(EntityType::LoRaWanDevice.is_composite());
    assert!(!EntityType::Thing.is_composite());
    assert!(!EntityType::Channel.is_composite());
    assert!(!EntityType::Connection.is_composite());
}

// ── OperationKind ───────────────────────────────────────────────

#[test]
fn operation_kind_parse() {
    assert_eq!(OperationKind::from_str("disconnect").unwrap(), OperationKind::Disconnect);
    assert!(OperationKind::from_str("upsert").is_err());
}

// ── OperationRequest constructors ───────────────────────────────

#[test]
fn create_has_no_id() {
    let req = OperationRequest::create(EntityType::Thing, payload(json!({"name": "sensor"})));
    assert_eq!(req.kind, OperationKind::Create);
    assert!(req.entity_id.is_none());
    assert!(req.validate().is_ok());
}

#[test]
fn connect_populates_ids() {
    let req = OperationRequest::connect("t1", "c1");
    assert_eq!(req.entity_type, EntityType::Connection);
    assert_eq!(req.thing_id(), Some("t1"));
    assert_eq!(req.channel_id(), Some("c1"));
    assert_eq!(req.connection_key().as_deref(), Some("t1:c1"));
    assert!(req.validate().is_ok());
}

// ── Validation ──────────────────────────────────────────────────

#[test]
fn create_with_id_is_rejected() {
    let mut req = OperationRequest::create(EntityType::Channel, Payload::new());
    req.entity_id = Some("c1".into());
    let err = req.validate().unwrap_err();
    assert!(err.to_string().contains("must not carry an id"));
}

#[test]
fn update_without_id_is_rejected() {
    let mut req = OperationRequest::update(EntityType::Thing, "", payload(json!({"name": "x"})));
    assert!(req.validate().is_err());
    req.entity_id = None;
    assert!(req.validate().is_err());
}

#[test]
fn update_with_empty_payload_is_rejected() {
    let req = OperationRequest::update(EntityType::Thing, "t1", Payload::new());
    assert!(req.validate().is_err());
}

#[test]
fn delete_needs_only_id() {
    assert!(OperationRequest::delete(EntityType::LoRaWanDevice, "t1").validate().is_ok());
}

#[test]
fn connect_missing_channel_is_rejected() {
    let mut req = OperationRequest::connect("t1", "c1");
    req.payload.remove("channel_id");
    let err = req.validate().unwrap_err();
    assert!(err.to_string().contains("channel_id"));
}

#[test]
fn connect_on_thing_is_rejected() {
    let mut req = OperationRequest::connect("t1", "c1");
    req.entity_type = EntityType::Thing;
    assert!(req.validate().is_err());
}

#[test]
fn create_connection_is_rejected() {
    let req = OperationRequest::create(EntityType::Connection, Payload::new());
    assert!(req.validate().is_err());
}

proptest! {
    #[test]
    fn non_blank_ids_validate_for_delete(id in "[a-zA-Z0-9-]{1,36}") {
        for entity in [EntityType::Thing, EntityType::Channel, EntityType::LoRaWanDevice] {
            prop_assert!(OperationRequest::delete(entity, id.clone()).validate().is_ok());
        }
    }

    #[test]
    fn blank_ids_never_validate(id in "[ \t]{0,8}") {
        prop_assert!(OperationRequest::delete(EntityType::Thing, id.clone()).validate().is_err());
        prop_assert!(OperationRequest::connect(id.clone(), "c1").validate().is_err());
    }
}
