// Docker engine stats via bollard (one-shot stats per container)

use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, StatsOptions};
use bollard::models::ContainerStatsResponse;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::collections::HashMap;

use super::{SourceError, StatsSource};
use crate::models::{ContainerRef, NetworkCounters, RawSample};

pub struct DockerSource {
    docker: Docker,
}

impl DockerSource {
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    fn running_filter() -> ListContainersOptions {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);
        ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        }
    }

    /// Finds a running cAdvisor container and derives its API base from the
    /// network gateway and the first published port.
    pub async fn discover_cadvisor(&self) -> Option<String> {
        let containers = match self.docker.list_containers(Some(Self::running_filter())).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, operation = "discover_cadvisor", "Docker list_containers failed");
                return None;
            }
        };
        containers.iter().find_map(|c| {
            let is_cadvisor = c.image.as_deref().is_some_and(|i| i.contains("cadvisor"))
                || c
                    .names
                    .as_ref()
                    .is_some_and(|n| n.iter().any(|n| n.contains("cadvisor")));
            if !is_cadvisor {
                return None;
            }
            let port = c.ports.as_ref()?.iter().find_map(|p| p.public_port)?;
            let gateway = c
                .network_settings
                .as_ref()?
                .networks
                .as_ref()?
                .values()
                .find_map(|n| n.gateway.clone().filter(|g| !g.is_empty()))?;
            Some(format!("http://{}:{}/api/v1.3", gateway, port))
        })
    }
}

impl StatsSource for DockerSource {
    async fn list_containers(&self) -> Result<Vec<ContainerRef>, SourceError> {
        let containers = self
            .docker
            .list_containers(Some(Self::running_filter()))
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                Some(ContainerRef::new(id, c.names.unwrap_or_default()))
            })
            .collect())
    }

    async fn sample(&self, container_id: &str) -> Result<RawSample, SourceError> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
            ..Default::default()
        };
        let mut stream = self.docker.stats(container_id, Some(options));
        match stream.next().await {
            Some(Ok(s)) => normalize(&s, container_id, Utc::now()),
            Some(Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            })) => Err(SourceError::NotFound(container_id.to_string())),
            Some(Err(e)) => Err(SourceError::Unavailable(e.to_string())),
            None => Err(SourceError::Unavailable(format!(
                "empty stats stream for {}",
                container_id
            ))),
        }
    }
}

/// Normalizes a Docker stats response into a RawSample. Network counters are summed over interfaces.
pub(crate) fn normalize(
    s: &ContainerStatsResponse,
    id: &str,
    timestamp: DateTime<Utc>,
) -> Result<RawSample, SourceError> {
    let cpu_time_ns = s
        .cpu_stats
        .as_ref()
        .and_then(|c| c.cpu_usage.as_ref())
        .and_then(|u| u.total_usage)
        .ok_or_else(|| SourceError::Malformed {
            container: id.to_string(),
            reason: "missing cpu_stats.cpu_usage.total_usage".into(),
        })?;

    let memory_bytes = s.memory_stats.as_ref().and_then(|m| m.usage).unwrap_or(0);

    let network = s
        .networks
        .as_ref()
        .map(|n| {
            n.values().fold(NetworkCounters::default(), |mut acc, v| {
                acc.rx_bytes += v.rx_bytes.unwrap_or(0);
                acc.tx_bytes += v.tx_bytes.unwrap_or(0);
                acc.rx_packets += v.rx_packets.unwrap_or(0);
                acc.tx_packets += v.tx_packets.unwrap_or(0);
                acc.rx_errors += v.rx_errors.unwrap_or(0);
                acc.tx_errors += v.tx_errors.unwrap_or(0);
                acc.rx_dropped += v.rx_dropped.unwrap_or(0);
                acc.tx_dropped += v.tx_dropped.unwrap_or(0);
                acc
            })
        })
        .unwrap_or_default();

    Ok(RawSample {
        container_id: id.to_string(),
        timestamp,
        network,
        memory_bytes,
        cpu_time_ns,
    })
}
