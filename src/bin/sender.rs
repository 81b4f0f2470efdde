use anyhow::Result;
use dockmon::config::AppConfig;
use dockmon::sampler::{ContainerFilter, PipelineCounters, Sampler, SamplerConfig};
use dockmon::stats_source::Source;
use dockmon::transmitter::{Transmitter, TransmitterConfig};
use dockmon::{logging, sampler, transmitter};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;

/// Time allowed for an in-flight batch to finish after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let app_config = AppConfig::load()?;
    let sample_timeout = Duration::from_millis(app_config.sampling.sample_timeout_ms);

    let source = Arc::new(Source::from_config(&app_config.source, sample_timeout).await?);
    let remote_ip = app_config.sampling.host_ip.clone().unwrap_or_default();
    if remote_ip.is_empty() {
        tracing::info!("HOST_IP not set; collector will tag records with the peer address");
    }

    let transmitter = Transmitter::new(TransmitterConfig {
        endpoint: app_config.transmit.collector_url.clone(),
        max_retries: app_config.transmit.max_retries,
        backoff_base: Duration::from_millis(app_config.transmit.backoff_ms),
        request_timeout: Duration::from_millis(app_config.transmit.timeout_ms),
    })?;

    let sampler = Sampler::new(
        source.clone(),
        SamplerConfig {
            window: Duration::from_secs(app_config.sampling.interval_secs),
            samples_per_window: app_config.sampling.samples_per_window,
            sample_timeout,
            concurrency: app_config.sampling.concurrency,
            remote_ip: remote_ip.clone(),
            filter: ContainerFilter::new(app_config.source.match_type),
        },
    );

    tracing::info!(
        source = source.name(),
        collector_url = %app_config.transmit.collector_url,
        remote_ip = %remote_ip,
        interval_secs = app_config.sampling.interval_secs,
        samples_per_window = app_config.sampling.samples_per_window,
        build = %dockmon::version::BUILD,
        "sender starting"
    );

    let counters = Arc::new(PipelineCounters::default());
    let (batch_tx, batch_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let transmitter_handle = transmitter::spawn(transmitter, batch_rx, counters.clone());
    let sampler_handle = sampler::spawn(sampler, batch_tx, counters, shutdown_rx);

    logging::shutdown_signal().await;
    let _ = shutdown_tx.send(());
    let _ = sampler_handle.await;
    if tokio::time::timeout(SHUTDOWN_GRACE, transmitter_handle)
        .await
        .is_err()
    {
        tracing::warn!("in-flight batch abandoned at shutdown");
    }

    Ok(())
}
