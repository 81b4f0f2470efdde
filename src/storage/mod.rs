// Storage writers: translate validated points into time-series writes.
// One write_point call per measurement group per container.

mod influx;
mod sqlite;

pub use influx::{InfluxWriter, to_line_protocol};
pub use sqlite::SqliteWriter;

use std::future::Future;

use crate::config::{StorageBackend, StorageConfig};
use crate::models::Point;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend unreachable: {0}")]
    Unreachable(String),
    #[error("storage backend rejected write ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("encoding point: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait PointWriter: Send + Sync {
    fn write_point(&self, point: &Point) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Backend selected from configuration.
pub enum Store {
    Influx(InfluxWriter),
    Sqlite(SqliteWriter),
}

impl PointWriter for Store {
    async fn write_point(&self, point: &Point) -> Result<(), StorageError> {
        match self {
            Store::Influx(w) => w.write_point(point).await,
            Store::Sqlite(w) => w.write_point(point).await,
        }
    }
}

/// Opens the configured backend. InfluxDB database creation failures are logged, not fatal:
/// the store may not be up yet and writes surface their own errors.
pub async fn connect(config: &StorageConfig) -> anyhow::Result<Store> {
    match config.backend {
        StorageBackend::Influxdb => {
            let writer = InfluxWriter::new(config)?;
            if let Err(e) = writer.ensure_database().await {
                tracing::warn!(error = %e, operation = "ensure_database", "could not create InfluxDB database");
            }
            Ok(Store::Influx(writer))
        }
        StorageBackend::Sqlite => {
            let writer = SqliteWriter::connect(&config.sqlite_path).await?;
            writer.init().await?;
            Ok(Store::Sqlite(writer))
        }
    }
}
