// Process configuration: optional TOML file (CONFIG_FILE), then environment overrides.

use anyhow::Context;
use serde::Deserialize;
use std::str::FromStr;

/// Upper bound on the window length (one day).
const MAX_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsSourceKind {
    Docker,
    Cadvisor,
}

impl FromStr for StatsSourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "cadvisor" => Ok(Self::Cadvisor),
            other => anyhow::bail!("unknown stats source {:?} (expected docker or cadvisor)", other),
        }
    }
}

/// Which containers the sender reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    All,
    Uuid,
    NoSender,
}

impl FromStr for MatchType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(Self::All),
            "UUID" => Ok(Self::Uuid),
            "NO_SENDER" | "NO_CADVISOR" => Ok(Self::NoSender),
            other => anyhow::bail!("unknown match type {:?} (expected ALL, UUID or NO_SENDER)", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Influxdb,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "influxdb" | "influx" => Ok(Self::Influxdb),
            "sqlite" => Ok(Self::Sqlite),
            other => anyhow::bail!("unknown storage backend {:?} (expected influxdb or sqlite)", other),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub sampling: SamplingConfig,
    pub transmit: TransmitConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: StatsSourceKind,
    /// cAdvisor API base; discovered through Docker when unset.
    pub cadvisor_url: Option<String>,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Window length.
    pub interval_secs: u64,
    /// Ticks per window.
    pub samples_per_window: u32,
    pub sample_timeout_ms: u64,
    /// Max concurrent per-container samples in one tick.
    pub concurrency: usize,
    /// `remote_ip` tag; left empty when unset so the collector uses the peer address.
    pub host_ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    pub collector_url: String,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub influxdb_host: String,
    pub influxdb_port: u16,
    pub influxdb_name: String,
    pub influxdb_username: String,
    pub influxdb_password: String,
    pub timeout_ms: u64,
    pub sqlite_path: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: StatsSourceKind::Docker,
            cadvisor_url: None,
            match_type: MatchType::All,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            samples_per_window: 60,
            sample_timeout_ms: 5_000,
            concurrency: 16,
            host_ip: None,
        }
    }
}

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            collector_url: "http://127.0.0.1:8787/collector/metrics".into(),
            max_retries: 3,
            backoff_ms: 500,
            timeout_ms: 10_000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8787,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Influxdb,
            influxdb_host: "localhost".into(),
            influxdb_port: 8086,
            influxdb_name: "metrics".into(),
            influxdb_username: "root".into(),
            influxdb_password: "root".into(),
            timeout_ms: 15_000,
            sqlite_path: "data/metrics.db".into(),
        }
    }
}

impl AppConfig {
    /// Loads CONFIG_FILE when set, then applies process environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let base = match std::env::var("CONFIG_FILE") {
            Ok(path) => {
                let s = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config file {}", path))?;
                toml::from_str(&s).with_context(|| format!("parsing config file {}", path))?
            }
            Err(_) => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Parse and validate config from a TOML string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment-style overrides from `lookup`, then validates.
    pub fn with_overrides<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("CADVISOR_URL") {
            self.source.cadvisor_url = Some(url);
            self.source.kind = StatsSourceKind::Cadvisor;
        }
        set_parsed(&var, "STATS_SOURCE", &mut self.source.kind)?;
        set_parsed(&var, "MATCH_TYPE", &mut self.source.match_type)?;

        set_parsed(&var, "SAMPLE_INTERVAL_SECS", &mut self.sampling.interval_secs)?;
        set_parsed(&var, "SAMPLES_PER_WINDOW", &mut self.sampling.samples_per_window)?;
        set_parsed(&var, "SAMPLE_TIMEOUT_MS", &mut self.sampling.sample_timeout_ms)?;
        set_parsed(&var, "SAMPLE_CONCURRENCY", &mut self.sampling.concurrency)?;
        if let Some(ip) = var("HOST_IP") {
            self.sampling.host_ip = Some(ip);
        }

        if let Some(url) = var("COLLECTOR_URL") {
            self.transmit.collector_url = url;
        }
        set_parsed(&var, "TRANSMIT_MAX_RETRIES", &mut self.transmit.max_retries)?;
        set_parsed(&var, "TRANSMIT_BACKOFF_MS", &mut self.transmit.backoff_ms)?;
        set_parsed(&var, "TRANSMIT_TIMEOUT_MS", &mut self.transmit.timeout_ms)?;

        if let Some(host) = var("COLLECTOR_HOST") {
            self.server.host = host;
        }
        set_parsed(&var, "COLLECTOR_PORT", &mut self.server.port)?;

        set_parsed(&var, "STORAGE_BACKEND", &mut self.storage.backend)?;
        if let Some(host) = var("COLLECTOR_INFLUXDB_HOST") {
            self.storage.influxdb_host = host;
        }
        set_parsed(&var, "COLLECTOR_INFLUXDB_PORT", &mut self.storage.influxdb_port)?;
        if let Some(name) = var("COLLECTOR_INFLUXDB_NAME") {
            self.storage.influxdb_name = name;
        }
        if let Some(user) = var("INFLUXDB_ADMIN_USERNAME") {
            self.storage.influxdb_username = user;
        }
        if let Some(password) = var("INFLUXDB_ADMIN_PASSWORD") {
            self.storage.influxdb_password = password;
        }
        set_parsed(&var, "STORAGE_TIMEOUT_MS", &mut self.storage.timeout_ms)?;
        if let Some(path) = var("SQLITE_PATH") {
            self.storage.sqlite_path = path;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.sampling.interval_secs > 0,
            "sampling.interval_secs must be > 0, got {}",
            self.sampling.interval_secs
        );
        anyhow::ensure!(
            self.sampling.interval_secs <= MAX_INTERVAL_SECS,
            "sampling.interval_secs must be at most {}, got {}",
            MAX_INTERVAL_SECS,
            self.sampling.interval_secs
        );
        anyhow::ensure!(
            self.sampling.samples_per_window > 0,
            "sampling.samples_per_window must be > 0, got {}",
            self.sampling.samples_per_window
        );
        anyhow::ensure!(
            u64::from(self.sampling.samples_per_window)
                <= self.sampling.interval_secs.saturating_mul(1000),
            "sampling.samples_per_window must leave at least 1ms per tick, got {} samples in {}s",
            self.sampling.samples_per_window,
            self.sampling.interval_secs
        );
        anyhow::ensure!(
            self.sampling.sample_timeout_ms > 0,
            "sampling.sample_timeout_ms must be > 0, got {}",
            self.sampling.sample_timeout_ms
        );
        anyhow::ensure!(
            self.sampling.concurrency > 0,
            "sampling.concurrency must be > 0, got {}",
            self.sampling.concurrency
        );
        reqwest::Url::parse(&self.transmit.collector_url).with_context(|| {
            format!(
                "transmit.collector_url must be an absolute URL, got {:?}",
                self.transmit.collector_url
            )
        })?;
        anyhow::ensure!(
            self.transmit.backoff_ms > 0,
            "transmit.backoff_ms must be > 0, got {}",
            self.transmit.backoff_ms
        );
        anyhow::ensure!(
            self.transmit.timeout_ms > 0,
            "transmit.timeout_ms must be > 0, got {}",
            self.transmit.timeout_ms
        );
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.storage.influxdb_port > 0,
            "storage.influxdb_port must be between 1 and 65535, got {}",
            self.storage.influxdb_port
        );
        anyhow::ensure!(
            !self.storage.influxdb_name.is_empty(),
            "storage.influxdb_name must be non-empty"
        );
        anyhow::ensure!(
            self.storage.timeout_ms > 0,
            "storage.timeout_ms must be > 0, got {}",
            self.storage.timeout_ms
        );
        anyhow::ensure!(
            !self.storage.sqlite_path.is_empty(),
            "storage.sqlite_path must be non-empty"
        );
        Ok(())
    }
}

fn set_parsed<T, F>(var: &F, key: &str, slot: &mut T) -> anyhow::Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = var(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}={:?}: {}", key, raw, e))?;
    }
    Ok(())
}
