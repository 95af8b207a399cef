//! Offline placeholder data served when neither system can be read.
//!
//! Every placeholder item carries `"offline": true` so views can badge it.

use fleetsync_types::EntityType;
use serde_json::{Value, json};

/// Static placeholder list for an entity type.
pub fn placeholder(entity: EntityType) -> Vec<Value> {
    match entity {
        EntityType::Thing => vec![
            json!({
                "id": "offline-thing-1",
                "name": "Temperature sensor (offline)",
                "metadata": { "type": "sensor" },
                "offline": true
            }),
            json!({
                "id": "offline-thing-2",
                "name": "Smart meter (offline)",
                "metadata": { "type": "meter" },
                "offline": true
            }),
        ],
        EntityType::Channel => vec![json!({
            "id": "offline-channel-1",
            "name": "Telemetry (offline)",
            "metadata": {},
            "offline": true
        })],
        EntityType::LoRaWanDevice => vec![json!({
            "id": "offline-lorawan-1",
            "name": "LoRaWAN node (offline)",
            "dev_eui": "0000000000000000",
            "metadata": { "type": "lorawan" },
            "offline": true
        })],
        EntityType::Connection => Vec::new(),
    }
}

/// Whether an item came from the placeholder set.
pub fn is_placeholder(item: &Value) -> bool {
    item.get("offline").and_then(Value::as_bool).unwrap_or(false)
}
