// Sampling loop: samples every selected container once per tick and folds the readings into
// one window per container; once per interval all windows are aggregated and handed to the
// transmitter as a single batch. Sampling fans out over a bounded pool, but only this loop
// writes into windows.

pub mod filter;
pub mod window;

pub use filter::ContainerFilter;

use chrono::{DateTime, Utc};
use futures_util::{StreamExt, stream};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval, interval_at};
use tracing::instrument;

use crate::aggregator::aggregate_window;
use crate::models::{Batch, MetricRecord, RawSample, batch_from_records};
use crate::stats_source::{SourceError, StatsSource};
use window::Window;

pub struct SamplerConfig {
    /// Window (aggregation interval) length.
    pub window: Duration,
    pub samples_per_window: u32,
    pub sample_timeout: Duration,
    pub concurrency: usize,
    /// Host address put on every record as `remote_ip`.
    pub remote_ip: String,
    pub filter: ContainerFilter,
}

impl SamplerConfig {
    pub fn tick_period(&self) -> Duration {
        (self.window / self.samples_per_window.max(1)).max(Duration::from_millis(1))
    }
}

/// Sender-side counters, logged once per window.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub samples_taken: AtomicU64,
    pub samples_failed: AtomicU64,
    pub windows_flushed: AtomicU64,
    pub records_produced: AtomicU64,
    pub batches_delivered: AtomicU64,
    pub batches_dropped: AtomicU64,
    /// Batches discarded because the previous one was still queued.
    pub batches_skipped: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub containers: usize,
    pub sampled: usize,
    pub failed: usize,
}

pub struct FlushOutcome {
    pub batch: Batch,
    pub windows: usize,
    pub records: usize,
}

pub struct Sampler<S> {
    source: Arc<S>,
    config: SamplerConfig,
    windows: HashMap<String, Window>,
    window_start: DateTime<Utc>,
}

impl<S: StatsSource + 'static> Sampler<S> {
    pub fn new(source: Arc<S>, config: SamplerConfig) -> Self {
        Self {
            source,
            config,
            windows: HashMap::new(),
            window_start: Utc::now(),
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Containers with an open window in the current interval.
    pub fn open_windows(&self) -> usize {
        self.windows.len()
    }

    /// Samples in the open window of `container_id`.
    pub fn window_samples(&self, container_id: &str) -> Option<&[RawSample]> {
        self.windows.get(container_id).map(|w| w.samples())
    }

    /// One tick: re-enumerate containers, sample each once, append to its window.
    /// A failed sample skips that container for this tick only.
    pub async fn tick(&mut self) -> TickSummary {
        let containers = match self.source.list_containers().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, operation = "list_containers", "skipping tick");
                return TickSummary::default();
            }
        };

        let targets: Vec<(String, String)> = containers
            .iter()
            .filter_map(|c| {
                self.config
                    .filter
                    .select_name(c)
                    .map(|name| (c.id.clone(), name))
            })
            .collect();

        let timeout = self.config.sample_timeout;
        let source = Arc::clone(&self.source);
        let results: Vec<(String, String, Result<RawSample, SourceError>)> =
            stream::iter(targets)
                .map(|(id, name)| {
                    let source = Arc::clone(&source);
                    async move {
                        let result = match tokio::time::timeout(timeout, source.sample(&id)).await
                        {
                            Ok(r) => r,
                            Err(_) => Err(SourceError::Timeout(timeout)),
                        };
                        (id, name, result)
                    }
                })
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

        let mut summary = TickSummary {
            containers: results.len(),
            ..Default::default()
        };
        for (id, name, result) in results {
            match result {
                Ok(sample) => {
                    let window = self
                        .windows
                        .entry(id.clone())
                        .or_insert_with(|| Window::new(id.clone(), name.clone(), self.window_start));
                    window.name = name;
                    if window.push(sample) {
                        summary.sampled += 1;
                    } else {
                        tracing::warn!(container = %id, "sample returned for a different container; discarded");
                        summary.failed += 1;
                    }
                }
                Err(e) => {
                    tracing::debug!(container = %name, error = %e, operation = "sample", "sample skipped");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Closes every open window at `end`, aggregates them and starts a fresh interval.
    /// Containers that vanished mid-window are flushed with the samples they have.
    pub fn flush(&mut self, end: DateTime<Utc>) -> FlushOutcome {
        let windows = std::mem::take(&mut self.windows);
        self.window_start = end;
        let window_count = windows.len();

        let records: Vec<MetricRecord> = windows
            .into_values()
            .map(|w| w.close(end))
            .filter_map(|w| aggregate_window(&w, &self.config.remote_ip))
            .collect();

        FlushOutcome {
            windows: window_count,
            records: records.len(),
            batch: batch_from_records(&records),
        }
    }
}

/// Spawns the sampler loop. Batches go to `batch_tx` without waiting; a batch that finds the
/// channel full is dropped. On shutdown the partial window is flushed best-effort.
pub fn spawn<S: StatsSource + 'static>(
    sampler: Sampler<S>,
    batch_tx: mpsc::Sender<Batch>,
    counters: Arc<PipelineCounters>,
    shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(sampler, batch_tx, counters, shutdown_rx))
}

#[instrument(skip_all, fields(window_secs = sampler.config.window.as_secs(), samples_per_window = sampler.config.samples_per_window))]
async fn run<S: StatsSource + 'static>(
    mut sampler: Sampler<S>,
    batch_tx: mpsc::Sender<Batch>,
    counters: Arc<PipelineCounters>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let window = sampler.config.window;
    let mut sample_tick = interval(sampler.config.tick_period());
    sample_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut flush_tick = interval_at(Instant::now() + window, window);
    flush_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                tracing::debug!("Sampler shutting down");
                hand_off(sampler.flush(Utc::now()), &batch_tx, &counters);
                break;
            }
            _ = flush_tick.tick() => {
                hand_off(sampler.flush(Utc::now()), &batch_tx, &counters);
            }
            _ = sample_tick.tick() => {
                let summary = sampler.tick().await;
                counters.samples_taken.fetch_add(summary.sampled as u64, Ordering::Relaxed);
                counters.samples_failed.fetch_add(summary.failed as u64, Ordering::Relaxed);
            }
        }
    }
}

fn hand_off(outcome: FlushOutcome, batch_tx: &mpsc::Sender<Batch>, counters: &PipelineCounters) {
    counters
        .windows_flushed
        .fetch_add(outcome.windows as u64, Ordering::Relaxed);
    counters
        .records_produced
        .fetch_add(outcome.records as u64, Ordering::Relaxed);

    tracing::info!(
        windows = outcome.windows,
        records = outcome.records,
        samples_taken_total = counters.samples_taken.load(Ordering::Relaxed),
        samples_failed_total = counters.samples_failed.load(Ordering::Relaxed),
        batches_delivered_total = counters.batches_delivered.load(Ordering::Relaxed),
        batches_dropped_total = counters.batches_dropped.load(Ordering::Relaxed),
        "window flushed"
    );

    if outcome.batch.is_empty() {
        return;
    }
    match batch_tx.try_send(outcome.batch) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            counters.batches_skipped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(operation = "hand_off", "previous batch still queued; dropping this window");
        }
        Err(TrySendError::Closed(_)) => {
            tracing::warn!(operation = "hand_off", "transmitter stopped; dropping this window");
        }
    }
}
