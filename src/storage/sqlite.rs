// SQLite point store: one row per measurement point, fields kept as JSON.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

use super::{PointWriter, StorageError};
use crate::models::{FieldValue, Measurement, Point, Tags};

pub struct SqliteWriter {
    pool: SqlitePool,
}

impl SqliteWriter {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metric_points (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                measurement TEXT NOT NULL,
                container_name TEXT NOT NULL,
                remote_ip TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                fields TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_points_measurement_ts ON metric_points(measurement, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        // One row per series and timestamp, so a resent batch overwrites instead of duplicating.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_points_series_ts ON metric_points(measurement, container_name, remote_ip, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_points(&self) -> Result<i64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM metric_points")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Points of one measurement in [from, to), ascending by timestamp.
    #[instrument(skip(self), fields(repo = "points", operation = "points_between"))]
    pub async fn points_between(
        &self,
        measurement: Measurement,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Point>, StorageError> {
        let rows = sqlx::query(
            "SELECT container_name, remote_ip, timestamp, fields FROM metric_points
             WHERE measurement = $1 AND timestamp >= $2 AND timestamp < $3 ORDER BY timestamp ASC, id ASC",
        )
        .bind(measurement.as_str())
        .bind(from.timestamp_millis())
        .bind(to.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let ts: i64 = row.try_get("timestamp")?;
            let fields: String = row.try_get("fields")?;
            let fields: BTreeMap<String, FieldValue> = serde_json::from_str(&fields)?;
            out.push(Point {
                measurement,
                timestamp: DateTime::from_timestamp_millis(ts).unwrap_or_default(),
                tags: Tags {
                    name: row.try_get("container_name")?,
                    remote_ip: row.try_get("remote_ip")?,
                },
                fields,
            });
        }
        Ok(out)
    }
}

impl PointWriter for SqliteWriter {
    async fn write_point(&self, point: &Point) -> Result<(), StorageError> {
        let fields = serde_json::to_string(&point.fields)?;
        sqlx::query(
            "INSERT INTO metric_points (measurement, container_name, remote_ip, timestamp, fields) VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT(measurement, container_name, remote_ip, timestamp) DO UPDATE SET fields = excluded.fields",
        )
        .bind(point.measurement.as_str())
        .bind(&point.tags.name)
        .bind(&point.tags.remote_ip)
        .bind(point.timestamp.timestamp_millis())
        .bind(fields)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
