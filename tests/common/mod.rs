// Shared test helpers
#![allow(dead_code)]

mod fixtures;

pub use fixtures::*;

use serde_json::{Value, json};

pub fn network_fields() -> Value {
    json!({
        "tx_bytes": 100, "rx_bytes": 200, "tx_packets": 3, "rx_packets": 4,
        "tx_errors": 0, "rx_errors": 0, "tx_dropped": 0, "rx_dropped": 1
    })
}

/// cpu, memory and network points for one container.
pub fn container_points(name: &str) -> Value {
    let point = |measurement: &str, fields: Value| {
        json!({
            "measurement": measurement,
            "timestamp": "2024-05-01T12:01:00Z",
            "tags": { "name": name, "remote_ip": "10.1.2.3" },
            "fields": fields
        })
    };
    json!([
        point("cpu.usage", json!({ "total": 5000 })),
        point("memory.usage", json!({ "total": 60.0, "ave": 20.0, "min": 10.0, "max": 30.0 })),
        point("network.usage", network_fields()),
    ])
}

pub fn well_formed_batch(containers: &[&str]) -> Value {
    let mut batch = serde_json::Map::new();
    for c in containers {
        batch.insert(c.to_string(), container_points(c));
    }
    Value::Object(batch)
}
