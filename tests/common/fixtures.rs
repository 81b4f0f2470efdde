// Fake stats source and recording storage writers shared by the integration tests

use chrono::Utc;
use dockmon::models::{ContainerRef, NetworkCounters, Point, RawSample};
use dockmon::stats_source::{SourceError, StatsSource};
use dockmon::storage::{PointWriter, StorageError};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Per-container base value; every counter of container `cN` is derived from N + 1.
pub fn base_of(id: &str) -> u64 {
    id.trim_start_matches('c').parse::<u64>().unwrap_or(0) + 1
}

/// Deterministic in-memory source. Counter values encode the container id so that
/// any sample ending up in the wrong window is detectable.
#[derive(Default)]
pub struct FakeSource {
    containers: Mutex<Vec<ContainerRef>>,
    reads: Mutex<HashMap<String, u64>>,
    failing: Mutex<HashSet<String>>,
    list_fails: Mutex<bool>,
}

impl FakeSource {
    pub fn with_containers(n: usize) -> Self {
        let source = Self::default();
        source.set_containers((0..n).map(|i| format!("c{}", i)).collect());
        source
    }

    pub fn set_containers(&self, ids: Vec<String>) {
        *self.containers.lock().unwrap() = ids
            .into_iter()
            .map(|id| {
                let alias = format!("/name-{}", id);
                ContainerRef::new(id, vec![alias])
            })
            .collect();
    }

    pub fn add_container(&self, container: ContainerRef) {
        self.containers.lock().unwrap().push(container);
    }

    pub fn fail_container(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn set_list_fails(&self, fails: bool) {
        *self.list_fails.lock().unwrap() = fails;
    }
}

impl StatsSource for FakeSource {
    async fn list_containers(&self) -> Result<Vec<ContainerRef>, SourceError> {
        if *self.list_fails.lock().unwrap() {
            return Err(SourceError::Unavailable("daemon down".into()));
        }
        Ok(self.containers.lock().unwrap().clone())
    }

    async fn sample(&self, container_id: &str) -> Result<RawSample, SourceError> {
        if self.failing.lock().unwrap().contains(container_id) {
            return Err(SourceError::Unavailable(format!("{} unreachable", container_id)));
        }
        let base = base_of(container_id);
        // Stagger completion so results arrive out of order.
        tokio::time::sleep(Duration::from_millis(base % 7)).await;
        let n = {
            let mut reads = self.reads.lock().unwrap();
            let n = reads.entry(container_id.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        Ok(RawSample {
            container_id: container_id.to_string(),
            timestamp: Utc::now(),
            network: NetworkCounters {
                tx_bytes: base * 1_000 + n * 100,
                rx_bytes: base * 2_000 + n * 200,
                tx_packets: base + n,
                rx_packets: base + 2 * n,
                ..Default::default()
            },
            memory_bytes: base * 1024,
            cpu_time_ns: base * 1_000_000 + n * 10,
        })
    }
}

/// Keeps every point it is asked to write.
#[derive(Default)]
pub struct RecordingWriter {
    pub points: Mutex<Vec<Point>>,
}

impl RecordingWriter {
    pub fn writes(&self) -> usize {
        self.points.lock().unwrap().len()
    }
}

impl PointWriter for RecordingWriter {
    async fn write_point(&self, point: &Point) -> Result<(), StorageError> {
        self.points.lock().unwrap().push(point.clone());
        Ok(())
    }
}

/// Simulates an unreachable store.
pub struct FailingWriter;

impl PointWriter for FailingWriter {
    async fn write_point(&self, _point: &Point) -> Result<(), StorageError> {
        Err(StorageError::Unreachable("connection refused".into()))
    }
}
