// InfluxDB 1.x HTTP write API (line protocol, second precision)

use std::time::Duration;

use super::{PointWriter, StorageError};
use crate::config::StorageConfig;
use crate::models::{FieldValue, Point};

pub struct InfluxWriter {
    client: reqwest::Client,
    base: String,
    database: String,
    username: String,
    password: String,
}

impl InfluxWriter {
    pub fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base: format!("http://{}:{}", config.influxdb_host, config.influxdb_port),
            database: config.influxdb_name.clone(),
            username: config.influxdb_username.clone(),
            password: config.influxdb_password.clone(),
        })
    }

    /// `CREATE DATABASE` is idempotent in InfluxDB 1.x.
    pub async fn ensure_database(&self) -> Result<(), StorageError> {
        let q = format!("CREATE DATABASE \"{}\"", self.database.replace('"', "\\\""));
        let resp = self
            .client
            .post(format!("{}/query", self.base))
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("q", q.as_str())])
            .send()
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;
        check_status(resp).await
    }
}

impl PointWriter for InfluxWriter {
    async fn write_point(&self, point: &Point) -> Result<(), StorageError> {
        let resp = self
            .client
            .post(format!("{}/write", self.base))
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("db", self.database.as_str()), ("precision", "s")])
            .body(to_line_protocol(point))
            .send()
            .await
            .map_err(|e| StorageError::Unreachable(e.to_string()))?;
        check_status(resp).await
    }
}

async fn check_status(resp: reqwest::Response) -> Result<(), StorageError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let message = resp.text().await.unwrap_or_default();
    Err(StorageError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Renders one point as an InfluxDB line. Empty tag values are omitted.
pub fn to_line_protocol(point: &Point) -> String {
    let mut line = escape(point.measurement.as_str(), &[',', ' ']);

    for (key, value) in [
        ("name", &point.tags.name),
        ("remote_ip", &point.tags.remote_ip),
    ] {
        if !value.is_empty() {
            line.push(',');
            line.push_str(key);
            line.push('=');
            line.push_str(&escape(value, &[',', '=', ' ']));
        }
    }

    line.push(' ');
    let fields: Vec<String> = point
        .fields
        .iter()
        .map(|(k, v)| {
            let value = match v {
                FieldValue::Integer(i) => format!("{}i", i),
                FieldValue::Float(f) => format!("{}", f),
            };
            format!("{}={}", escape(k, &[',', '=', ' ']), value)
        })
        .collect();
    line.push_str(&fields.join(","));

    line.push(' ');
    line.push_str(&point.timestamp.timestamp().to_string());
    line
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
