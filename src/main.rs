//! KOTI - Home-Automation Hub Event Gateway
//!
//! Polls a home-automation hub for telemetry and forwards normalized
//! documents to a search datastore.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! cargo run
//!
//! # Point at a real hub and sink
//! KOTI_HUB_URL=http://hub.local:8090 KOTI_SINK_URL=http://es.local:9200 cargo run
//! ```
//!
//! ## Environment Variables
//!
//! - `KOTI_HUB_URL`: hub base URL (default: "http://localhost:8090")
//! - `KOTI_SINK_URL`: search datastore URL (default: "http://localhost:9200")
//! - `KOTI_SINK_INDEX`: target index (default: "koti-events")
//! - `KOTI_METRICS_ADDR`: metrics server address (default: "127.0.0.1:9090")
//! - `KOTI_BUFFER_CAPACITY`: document buffer capacity (default: 10000)
//! - `KOTI_LOG_LEVEL`: log level (default: "info")
//! - `KOTI_LOG_FORMAT`: "json" or "pretty" (default: "pretty")
//! - `KOTI_REPLAY_FILE`: JSONL capture to replay instead of polling the hub

use koti_gateway::config::{Config, LogFormat};
use koti_gateway::ingest::{HubPoller, IngestContext, Ingestor, JsonLines};
use koti_gateway::metrics::Metrics;
use koti_gateway::metrics_server::MetricsServer;
use koti_gateway::pipeline::{Pipeline, RecordSender};
use koti_gateway::{SearchEmitter, StdoutEmitter};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first so logging can honor it
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    info!(
        hub_url = %config.hub_url,
        sink_url = %config.sink_url,
        sink_index = %config.sink_index,
        metrics_addr = %config.metrics_addr,
        buffer_capacity = config.buffer_capacity,
        "Starting KOTI Gateway"
    );

    Metrics::init()?;
    let _metrics_handle = MetricsServer::start(config.metrics_addr);

    // Sink: search datastore, plus stdout when debugging
    let mut search = SearchEmitter::new(&config.sink_url, &config.sink_index)?;
    if let (Some(username), Some(password)) = (&config.sink_username, &config.sink_password) {
        search = search.basic_auth(username, password);
    }

    let mut pipeline = Pipeline::new()
        .buffer_capacity(config.buffer_capacity)
        .batch_size(config.batch_size)
        .flush_interval(Duration::from_millis(config.flush_interval_ms))
        .emitter(search);

    if std::env::var("KOTI_DEBUG_STDOUT").is_ok() {
        pipeline = pipeline.emitter(StdoutEmitter::new());
        info!("Registered stdout emitter (debug mode)");
    }

    let (sender, runner) = pipeline.build();

    let runner_handle = tokio::spawn(runner.run());

    // Replay mode: feed a recorded capture through the pipeline and
    // exit instead of polling the hub
    if let Some(path) = &config.replay_file {
        replay_capture(path, &JsonLines, sender).await?;

        match runner_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Pipeline error during replay"),
            Err(e) => error!(error = %e, "Pipeline task panicked"),
        }

        info!("Replay complete");
        return Ok(());
    }

    // Hub poller feeds the pipeline until the sender is dropped
    let poller = HubPoller::new(&config.hub_url, config.poll_timeout_secs)?;
    let poller_sender = sender.clone();
    let poller_handle = tokio::spawn(async move {
        if let Err(e) = poller.run(poller_sender).await {
            error!(error = %e, "Hub poller failed");
        }
    });

    shutdown_signal().await;

    // Dropping the last sender closes the channel; the runner drains
    // the buffer and shuts emitters down.
    poller_handle.abort();
    drop(sender);

    match runner_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Pipeline error during shutdown"),
        Err(e) => error!(error = %e, "Pipeline task panicked"),
    }

    info!("KOTI Gateway shutdown complete");
    Ok(())
}

/// Decode a capture file with the given ingestor and send every record
/// into the pipeline. Consumes the sender so the channel closes when
/// the capture ends.
async fn replay_capture(
    path: &str,
    ingestor: &dyn Ingestor,
    sender: RecordSender,
) -> anyhow::Result<()> {
    let data = tokio::fs::read(path).await?;
    let ctx = IngestContext { source: path };
    let records = ingestor.ingest(&ctx, &data)?;

    info!(
        ingestor = ingestor.name(),
        path,
        records = records.len(),
        "Replaying capture"
    );

    for record in records {
        sender.send(record).await?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
