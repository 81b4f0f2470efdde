// Wire format: container id -> list of measurement points.
// Parsing is all-or-nothing: one bad record rejects the whole batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::record::{Measurement, MetricRecord};

/// Container id -> points for that container, in window order.
pub type Batch = BTreeMap<String, Vec<Point>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    pub name: String,
    pub remote_ip: String,
}

/// Numeric field value. Counters travel as integers, memory gauges as floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(u64),
    Float(f64),
}

impl FieldValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            FieldValue::Integer(v) => v as f64,
            FieldValue::Float(v) => v,
        }
    }
}

/// One measurement group for one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: Measurement,
    pub timestamp: DateTime<Utc>,
    pub tags: Tags,
    pub fields: BTreeMap<String, FieldValue>,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("payload is not a JSON object of record lists: {0}")]
    Shape(String),
    #[error("empty container identifier")]
    EmptyContainerKey,
    #[error("container {container}, record {index}: {reason}")]
    InvalidRecord {
        container: String,
        index: usize,
        reason: String,
    },
}

/// Builds the wire batch for one window's records.
pub fn batch_from_records(records: &[MetricRecord]) -> Batch {
    let mut batch = Batch::new();
    for r in records {
        batch
            .entry(r.container_id.clone())
            .or_default()
            .extend(r.to_points());
    }
    batch
}

/// Parses and validates a request body. Returns every point or nothing.
pub fn parse_batch(body: &[u8]) -> Result<Vec<Point>, ValidationError> {
    let raw: BTreeMap<String, Vec<serde_json::Value>> =
        serde_json::from_slice(body).map_err(|e| ValidationError::Shape(e.to_string()))?;

    let mut points = Vec::with_capacity(raw.values().map(Vec::len).sum());
    for (container, entries) in raw {
        if container.is_empty() {
            return Err(ValidationError::EmptyContainerKey);
        }
        for (index, value) in entries.into_iter().enumerate() {
            let invalid = |reason: String| ValidationError::InvalidRecord {
                container: container.clone(),
                index,
                reason,
            };
            let point: Point = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
            validate_point(&point).map_err(invalid)?;
            points.push(point);
        }
    }
    Ok(points)
}

fn validate_point(point: &Point) -> Result<(), String> {
    if point.tags.name.is_empty() {
        return Err("tag `name` is empty".into());
    }
    for field in point.measurement.required_fields() {
        if !point.fields.contains_key(*field) {
            return Err(format!(
                "{} is missing required field `{}`",
                point.measurement, field
            ));
        }
    }
    for (name, value) in &point.fields {
        let v = value.as_f64();
        if !v.is_finite() || v < 0.0 {
            return Err(format!("field `{}` must be a non-negative number", name));
        }
    }
    Ok(())
}
