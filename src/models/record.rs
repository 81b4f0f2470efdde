// Aggregated per-container record for one window

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::batch::{FieldValue, Point, Tags};

/// The three measurement groups carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Measurement {
    #[serde(rename = "cpu.usage")]
    Cpu,
    #[serde(rename = "memory.usage")]
    Memory,
    #[serde(rename = "network.usage")]
    Network,
}

impl Measurement {
    pub const ALL: [Measurement; 3] = [Measurement::Cpu, Measurement::Memory, Measurement::Network];

    pub fn as_str(&self) -> &'static str {
        match self {
            Measurement::Cpu => "cpu.usage",
            Measurement::Memory => "memory.usage",
            Measurement::Network => "network.usage",
        }
    }

    /// Field names a point of this measurement must carry.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Measurement::Cpu => &["total"],
            Measurement::Memory => &["ave", "min", "max"],
            Measurement::Network => &[
                "tx_bytes",
                "rx_bytes",
                "tx_packets",
                "rx_packets",
                "tx_errors",
                "rx_errors",
                "tx_dropped",
                "rx_dropped",
            ],
        }
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network deltas across a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkUsage {
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_errors: u64,
    pub rx_errors: u64,
    pub tx_dropped: u64,
    pub rx_dropped: u64,
}

/// Resident memory summary in KB.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryUsage {
    pub total: f64,
    pub ave: f64,
    pub min: f64,
    pub max: f64,
}

/// CPU time consumed within a window, in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuUsage {
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub container_id: String,
    pub name: String,
    pub remote_ip: String,
    /// End of the window this record covers.
    pub timestamp: DateTime<Utc>,
    pub network: NetworkUsage,
    pub memory: MemoryUsage,
    pub cpu: CpuUsage,
}

impl MetricRecord {
    /// Wire points in cpu, memory, network order.
    pub fn to_points(&self) -> Vec<Point> {
        let tags = Tags {
            name: self.name.clone(),
            remote_ip: self.remote_ip.clone(),
        };
        let point = |measurement, fields| Point {
            measurement,
            timestamp: self.timestamp,
            tags: tags.clone(),
            fields,
        };

        let cpu = BTreeMap::from([("total".to_string(), FieldValue::Integer(self.cpu.total))]);

        let memory = BTreeMap::from([
            ("total".to_string(), FieldValue::Float(self.memory.total)),
            ("ave".to_string(), FieldValue::Float(self.memory.ave)),
            ("min".to_string(), FieldValue::Float(self.memory.min)),
            ("max".to_string(), FieldValue::Float(self.memory.max)),
        ]);

        let n = &self.network;
        let network = [
            ("tx_bytes", n.tx_bytes),
            ("rx_bytes", n.rx_bytes),
            ("tx_packets", n.tx_packets),
            ("rx_packets", n.rx_packets),
            ("tx_errors", n.tx_errors),
            ("rx_errors", n.rx_errors),
            ("tx_dropped", n.tx_dropped),
            ("rx_dropped", n.rx_dropped),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), FieldValue::Integer(v)))
        .collect();

        vec![
            point(Measurement::Cpu, cpu),
            point(Measurement::Memory, memory),
            point(Measurement::Network, network),
        ]
    }
}
