// Raw per-container readings as returned by a stats source

use chrono::{DateTime, Utc};

/// Cumulative network counters summed over every interface of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_errors: u64,
    pub rx_errors: u64,
    pub tx_dropped: u64,
    pub rx_dropped: u64,
}

/// One instantaneous reading for one container at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub container_id: String,
    pub timestamp: DateTime<Utc>,
    pub network: NetworkCounters,
    /// Resident memory in bytes (gauge).
    pub memory_bytes: u64,
    /// Cumulative CPU time in nanoseconds.
    pub cpu_time_ns: u64,
}

/// A container as enumerated by a stats source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub id: String,
    /// Names and aliases, leading `/` already stripped.
    pub aliases: Vec<String>,
}

impl ContainerRef {
    pub fn new(id: impl Into<String>, aliases: Vec<String>) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|a| a.trim_start_matches('/').to_string())
            .filter(|a| !a.is_empty())
            .collect();
        Self {
            id: id.into(),
            aliases,
        }
    }

    /// First alias, or the id when the container has no name.
    pub fn display_name(&self) -> &str {
        self.aliases.first().map(String::as_str).unwrap_or(&self.id)
    }
}
