// Stats source capability: enumerate containers and take one raw reading per container.
// Two backends (Docker engine API, cAdvisor REST); the concrete one is chosen once at startup.

mod cadvisor;
mod docker;

pub use cadvisor::CadvisorSource;
pub use docker::DockerSource;

use std::future::Future;
use std::time::Duration;

use anyhow::Context;

use crate::config::{SourceConfig, StatsSourceKind};
use crate::models::{ContainerRef, RawSample};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("stats source unavailable: {0}")]
    Unavailable(String),
    #[error("container {0} not found")]
    NotFound(String),
    #[error("malformed stats for container {container}: {reason}")]
    Malformed { container: String, reason: String },
    #[error("sample timed out after {0:?}")]
    Timeout(Duration),
}

pub trait StatsSource: Send + Sync {
    /// Containers currently running on this host.
    fn list_containers(
        &self,
    ) -> impl Future<Output = Result<Vec<ContainerRef>, SourceError>> + Send;

    /// One reading of the cumulative counters for `container_id`.
    fn sample(
        &self,
        container_id: &str,
    ) -> impl Future<Output = Result<RawSample, SourceError>> + Send;
}

/// Backend selected from configuration.
pub enum Source {
    Docker(DockerSource),
    Cadvisor(CadvisorSource),
}

impl Source {
    pub async fn from_config(config: &SourceConfig, request_timeout: Duration) -> anyhow::Result<Self> {
        match config.kind {
            StatsSourceKind::Docker => Ok(Source::Docker(DockerSource::connect()?)),
            StatsSourceKind::Cadvisor => {
                let base = match &config.cadvisor_url {
                    Some(url) => url.clone(),
                    None => DockerSource::connect()?
                        .discover_cadvisor()
                        .await
                        .context("CADVISOR_URL not set and no cadvisor container found")?,
                };
                tracing::info!(cadvisor_url = %base, "using cadvisor stats source");
                Ok(Source::Cadvisor(CadvisorSource::new(base, request_timeout)?))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Source::Docker(_) => "docker",
            Source::Cadvisor(_) => "cadvisor",
        }
    }
}

impl StatsSource for Source {
    async fn list_containers(&self) -> Result<Vec<ContainerRef>, SourceError> {
        match self {
            Source::Docker(s) => s.list_containers().await,
            Source::Cadvisor(s) => s.list_containers().await,
        }
    }

    async fn sample(&self, container_id: &str) -> Result<RawSample, SourceError> {
        match self {
            Source::Docker(s) => s.sample(container_id).await,
            Source::Cadvisor(s) => s.sample(container_id).await,
        }
    }
}
