// Batch delivery to the ingestion endpoint: one POST per batch, bounded retries with
// exponential backoff, then the batch is dropped. Nothing is spooled locally.

use anyhow::Context;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tokio::time::Duration;

use crate::models::Batch;
use crate::sampler::PipelineCounters;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TransmitterConfig {
    pub endpoint: String,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    #[error("serializing batch: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("collector responded {0}")]
    Status(reqwest::StatusCode),
}

/// Terminal result of delivering one batch.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Dropped { attempts: u32, error: TransmitError },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts } | DeliveryOutcome::Dropped { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Delay before retry number `retry` (1-based): base * 2^(retry-1), capped.
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

pub struct Transmitter {
    client: reqwest::Client,
    config: TransmitterConfig,
}

impl Transmitter {
    pub fn new(config: TransmitterConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransmitterConfig {
        &self.config
    }

    async fn post(&self, body: &[u8]) -> Result<(), TransmitError> {
        let resp = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .body(body.to_vec())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransmitError::Status(status));
        }
        Ok(())
    }

    /// Sends `batch`, retrying any transport error or non-2xx status up to `max_retries` times.
    pub async fn deliver(&self, batch: &Batch) -> DeliveryOutcome {
        let body = match serde_json::to_vec(batch) {
            Ok(b) => b,
            Err(e) => {
                return DeliveryOutcome::Dropped {
                    attempts: 0,
                    error: e.into(),
                };
            }
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.post(&body).await {
                Ok(()) => return DeliveryOutcome::Delivered { attempts },
                Err(error) if attempts > self.config.max_retries => {
                    return DeliveryOutcome::Dropped { attempts, error };
                }
                Err(e) => {
                    let delay = backoff_delay(self.config.backoff_base, attempts);
                    tracing::debug!(
                        error = %e,
                        attempt = attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        "batch send failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Spawns the delivery task. It drains `batch_rx` one batch at a time and exits when the
/// sampler drops its sender.
pub fn spawn(
    transmitter: Transmitter,
    mut batch_rx: mpsc::Receiver<Batch>,
    counters: Arc<PipelineCounters>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(batch) = batch_rx.recv().await {
            let containers = batch.len();
            match transmitter.deliver(&batch).await {
                DeliveryOutcome::Delivered { attempts } => {
                    counters.batches_delivered.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        containers,
                        attempts,
                        endpoint = %transmitter.config.endpoint,
                        "batch delivered"
                    );
                }
                DeliveryOutcome::Dropped { attempts, error } => {
                    counters.batches_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        error = %error,
                        containers,
                        attempts,
                        endpoint = %transmitter.config.endpoint,
                        "batch dropped after retries"
                    );
                }
            }
        }
        tracing::debug!("Transmitter shutting down");
    })
}
