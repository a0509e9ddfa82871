//! wg-status-agent - Wargaming server status to Discord channel names
//!
//! Long-running agent that:
//! - Fetches per-region player counts from the WG statistics API
//! - Measures latency to the configured game clusters (TCP connect probes)
//! - Merges both into a per-server status view
//! - Renames the mapped Discord channels under the API rate limit

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wg_status_agent::config::{load_clusters, AgentConfig, ChannelTargets};
use wg_status_agent::dispatch::UpdateDispatcher;
use wg_status_agent::probe::LatencyProbe;
use wg_status_agent::scheduler::AggregationScheduler;
use wg_status_agent::sink::DiscordSink;
use wg_status_agent::telemetry::TelemetryFetcher;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wg_status_agent=info")),
        )
        .init();

    info!("🚀 wg-status-agent starting...");

    // Missing credentials must stop the process here, never mid-cycle.
    let config = AgentConfig::from_env().context("incomplete startup configuration")?;

    let endpoints = load_clusters("clusters.json").await;
    let targets = ChannelTargets::from_env();
    info!(
        "loaded {} clusters, {} servers with channel targets",
        endpoints.len(),
        targets.configured_count()
    );

    // One HTTP client shared by the WG fetcher and the Discord sink for the
    // whole process lifetime.
    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let fetcher = TelemetryFetcher::new(client.clone(), &config);
    let probe = LatencyProbe::new(&config);
    let sink = DiscordSink::new(client, &config);
    let dispatcher = UpdateDispatcher::new(sink, &config);
    let scheduler =
        AggregationScheduler::new(fetcher, probe, dispatcher, endpoints, targets, &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let grace = config.shutdown_grace;
    let scheduler_task = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    // Bounded grace: the scheduler abandons its in-flight cycle on its own,
    // but never let a stuck network call keep the process alive.
    if timeout(grace, scheduler_task).await.is_err() {
        warn!("scheduler did not stop within {grace:?}, aborting");
    }

    info!("wg-status-agent stopped");
    Ok(())
}
