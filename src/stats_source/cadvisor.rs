// cAdvisor REST API (v1.3) stats source

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::{SourceError, StatsSource};
use crate::models::{ContainerRef, NetworkCounters, RawSample};

#[derive(Debug, Deserialize)]
struct ContainerInfo {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    stats: Vec<ContainerStat>,
}

#[derive(Debug, Deserialize)]
struct ContainerStat {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    cpu: CpuStat,
    #[serde(default)]
    memory: MemoryStat,
    #[serde(default)]
    network: NetworkStat,
}

#[derive(Debug, Default, Deserialize)]
struct CpuStat {
    #[serde(default)]
    usage: CpuUsageStat,
}

#[derive(Debug, Default, Deserialize)]
struct CpuUsageStat {
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Default, Deserialize)]
struct MemoryStat {
    #[serde(default)]
    usage: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NetworkStat {
    rx_bytes: u64,
    rx_packets: u64,
    rx_errors: u64,
    rx_dropped: u64,
    tx_bytes: u64,
    tx_packets: u64,
    tx_errors: u64,
    tx_dropped: u64,
}

impl ContainerInfo {
    /// Docker id: the reported `id`, else the 64-hex alias, else the cgroup name with
    /// the systemd `docker-<id>.scope` wrapping removed.
    fn id(&self) -> &str {
        if !self.id.is_empty() {
            return &self.id;
        }
        if let Some(alias) = self.aliases.iter().find(|a| is_full_id(a)) {
            return alias;
        }
        let last = self.name.rsplit('/').next().unwrap_or(&self.name);
        last.strip_prefix("docker-")
            .and_then(|s| s.strip_suffix(".scope"))
            .unwrap_or(last)
    }
}

fn is_full_id(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

pub struct CadvisorSource {
    client: reqwest::Client,
    base: String,
}

impl CadvisorSource {
    pub fn new(base: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_docker(&self, path: &str) -> Result<HashMap<String, ContainerInfo>, SourceError> {
        let url = format!("{}/docker{}", self.base, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(path.trim_start_matches('/').to_string()));
        }
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "cadvisor returned {} for {}",
                status, url
            )));
        }
        resp.json().await.map_err(|e| SourceError::Malformed {
            container: path.trim_start_matches('/').to_string(),
            reason: e.to_string(),
        })
    }
}

impl StatsSource for CadvisorSource {
    async fn list_containers(&self) -> Result<Vec<ContainerRef>, SourceError> {
        let containers = self.get_docker("").await?;
        Ok(containers
            .values()
            .map(|c| {
                let id = c.id().to_string();
                let aliases = c.aliases.iter().filter(|a| **a != id).cloned().collect();
                ContainerRef::new(id, aliases)
            })
            .collect())
    }

    async fn sample(&self, container_id: &str) -> Result<RawSample, SourceError> {
        let containers = self.get_docker(&format!("/{}", container_id)).await?;
        let stat = containers
            .values()
            .find_map(|c| c.stats.last())
            .ok_or_else(|| SourceError::Malformed {
                container: container_id.to_string(),
                reason: "no stats entries".into(),
            })?;
        Ok(to_raw_sample(stat, container_id))
    }
}

fn to_raw_sample(stat: &ContainerStat, id: &str) -> RawSample {
    let n = &stat.network;
    RawSample {
        container_id: id.to_string(),
        timestamp: stat.timestamp,
        network: NetworkCounters {
            tx_bytes: n.tx_bytes,
            rx_bytes: n.rx_bytes,
            tx_packets: n.tx_packets,
            rx_packets: n.rx_packets,
            tx_errors: n.tx_errors,
            rx_errors: n.rx_errors,
            tx_dropped: n.tx_dropped,
            rx_dropped: n.rx_dropped,
        },
        memory_bytes: stat.memory.usage,
        cpu_time_ns: stat.cpu.usage.total,
    }
}
