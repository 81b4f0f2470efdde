// Config loading, environment overrides and validation tests

use dockmon::config::{AppConfig, MatchType, StatsSourceKind, StorageBackend};
use std::collections::HashMap;

const VALID_CONFIG: &str = r#"
[source]
kind = "docker"
match_type = "NO_SENDER"

[sampling]
interval_secs = 30
samples_per_window = 15
sample_timeout_ms = 2000
concurrency = 4

[transmit]
collector_url = "http://collector:8787/collector/metrics"
max_retries = 5
backoff_ms = 250
timeout_ms = 3000

[server]
host = "0.0.0.0"
port = 9000

[storage]
backend = "sqlite"
sqlite_path = "data/test.db"
"#;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_config_defaults() {
    let config = AppConfig::default().with_overrides(env(&[])).expect("defaults");
    assert_eq!(config.source.kind, StatsSourceKind::Docker);
    assert_eq!(config.source.match_type, MatchType::All);
    assert!(config.source.cadvisor_url.is_none());
    assert_eq!(config.sampling.interval_secs, 60);
    assert_eq!(config.sampling.samples_per_window, 60);
    assert_eq!(config.transmit.max_retries, 3);
    assert_eq!(
        config.transmit.collector_url,
        "http://127.0.0.1:8787/collector/metrics"
    );
    assert_eq!(config.server.port, 8787);
    assert_eq!(config.storage.backend, StorageBackend::Influxdb);
    assert_eq!(config.storage.influxdb_port, 8086);
}

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.source.match_type, MatchType::NoSender);
    assert_eq!(config.sampling.interval_secs, 30);
    assert_eq!(config.sampling.samples_per_window, 15);
    assert_eq!(config.sampling.concurrency, 4);
    assert_eq!(config.transmit.max_retries, 5);
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert_eq!(config.storage.sqlite_path, "data/test.db");
    // Omitted keys keep their defaults.
    assert_eq!(config.storage.influxdb_name, "metrics");
}

#[test]
fn test_env_overrides_file_values() {
    let config = AppConfig::load_from_str(VALID_CONFIG)
        .unwrap()
        .with_overrides(env(&[
            ("COLLECTOR_URL", "http://10.0.0.2:8787/collector/metrics"),
            ("SAMPLE_INTERVAL_SECS", "10"),
            ("TRANSMIT_MAX_RETRIES", "0"),
            ("MATCH_TYPE", "uuid"),
            ("STORAGE_BACKEND", "influxdb"),
            ("COLLECTOR_INFLUXDB_HOST", "influx"),
            ("INFLUXDB_ADMIN_PASSWORD", "secret"),
            ("HOST_IP", "192.168.1.4"),
        ]))
        .expect("overrides");
    assert_eq!(
        config.transmit.collector_url,
        "http://10.0.0.2:8787/collector/metrics"
    );
    assert_eq!(config.sampling.interval_secs, 10);
    assert_eq!(config.transmit.max_retries, 0);
    assert_eq!(config.source.match_type, MatchType::Uuid);
    assert_eq!(config.storage.backend, StorageBackend::Influxdb);
    assert_eq!(config.storage.influxdb_host, "influx");
    assert_eq!(config.storage.influxdb_password, "secret");
    assert_eq!(config.sampling.host_ip.as_deref(), Some("192.168.1.4"));
}

#[test]
fn test_cadvisor_url_selects_cadvisor() {
    let config = AppConfig::default()
        .with_overrides(env(&[("CADVISOR_URL", "http://cadvisor:8080/api/v1.3")]))
        .unwrap();
    assert_eq!(config.source.kind, StatsSourceKind::Cadvisor);
    assert_eq!(
        config.source.cadvisor_url.as_deref(),
        Some("http://cadvisor:8080/api/v1.3")
    );
}

#[test]
fn test_blank_env_values_are_ignored() {
    let config = AppConfig::default()
        .with_overrides(env(&[("CADVISOR_URL", "  "), ("COLLECTOR_PORT", "")]))
        .unwrap();
    assert_eq!(config.source.kind, StatsSourceKind::Docker);
    assert_eq!(config.server.port, 8787);
}

#[test]
fn test_legacy_no_cadvisor_match_type() {
    let config = AppConfig::default()
        .with_overrides(env(&[("MATCH_TYPE", "NO_CADVISOR")]))
        .unwrap();
    assert_eq!(config.source.match_type, MatchType::NoSender);
}

#[test]
fn test_unparseable_env_value_names_the_key() {
    let err = AppConfig::default()
        .with_overrides(env(&[("SAMPLE_CONCURRENCY", "lots")]))
        .unwrap_err();
    assert!(err.to_string().contains("SAMPLE_CONCURRENCY"));

    let err = AppConfig::default()
        .with_overrides(env(&[("STATS_SOURCE", "podman")]))
        .unwrap_err();
    assert!(err.to_string().contains("STATS_SOURCE"));
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 9000", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_zero_interval() {
    let bad = VALID_CONFIG.replace("interval_secs = 30", "interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("sampling.interval_secs"));
}

#[test]
fn test_config_validation_rejects_zero_samples_per_window() {
    let bad = VALID_CONFIG.replace("samples_per_window = 15", "samples_per_window = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("samples_per_window"));
}

#[test]
fn test_config_validation_rejects_zero_concurrency() {
    let bad = VALID_CONFIG.replace("concurrency = 4", "concurrency = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("sampling.concurrency"));
}

#[test]
fn test_config_validation_rejects_relative_collector_url() {
    let err = AppConfig::default()
        .with_overrides(env(&[("COLLECTOR_URL", "collector/metrics")]))
        .unwrap_err();
    assert!(err.to_string().contains("transmit.collector_url"));
}

#[test]
fn test_config_validation_rejects_empty_sqlite_path() {
    let bad = VALID_CONFIG.replace("sqlite_path = \"data/test.db\"", "sqlite_path = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("storage.sqlite_path"));
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_rejects_unknown_backend_in_file() {
    let bad = VALID_CONFIG.replace("backend = \"sqlite\"", "backend = \"postgres\"");
    assert!(AppConfig::load_from_str(&bad).is_err());
}

#[test]
fn test_config_validation_rejects_oversized_interval() {
    let err = AppConfig::default()
        .with_overrides(env(&[("SAMPLE_INTERVAL_SECS", u64::MAX.to_string().as_str())]))
        .unwrap_err();
    assert!(err.to_string().contains("sampling.interval_secs"));

    let config = AppConfig::default()
        .with_overrides(env(&[("SAMPLE_INTERVAL_SECS", "86400")]))
        .unwrap();
    assert_eq!(config.sampling.interval_secs, 86_400);
}
