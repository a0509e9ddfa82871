//! Aggregation cycle scheduler
//!
//! One long-lived loop: fetch + probe concurrently, merge, dispatch, sleep,
//! repeat. Fixed-delay scheduling (no drift correction). Every data-source
//! or sink failure is contained inside its stage, so a cycle always
//! completes; the only way out of the loop is the shutdown signal, which
//! abandons the in-flight cycle instead of awaiting it.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::{AgentConfig, ChannelTargets, ClusterEndpoint};
use crate::dispatch::{DispatchReport, UpdateDispatcher};
use crate::probe::LatencyProbe;
use crate::sink::Sink;
use crate::status::merge;
use crate::telemetry::{Region, TelemetryFetcher};

/// Drives the repeating fetch-probe-merge-dispatch cycle.
pub struct AggregationScheduler<S> {
    fetcher: TelemetryFetcher,
    probe: LatencyProbe,
    dispatcher: UpdateDispatcher<S>,
    endpoints: Vec<ClusterEndpoint>,
    targets: ChannelTargets,
    cycle_interval: Duration,
    probe_concurrency: usize,
}

impl<S: Sink> AggregationScheduler<S> {
    pub fn new(
        fetcher: TelemetryFetcher,
        probe: LatencyProbe,
        dispatcher: UpdateDispatcher<S>,
        endpoints: Vec<ClusterEndpoint>,
        targets: ChannelTargets,
        config: &AgentConfig,
    ) -> Self {
        Self {
            fetcher,
            probe,
            dispatcher,
            endpoints,
            targets,
            cycle_interval: config.cycle_interval,
            probe_concurrency: config.probe_concurrency,
        }
    }

    /// Run cycles until `shutdown` flips. The in-flight cycle and the sleep
    /// are both cancellable; callers bound the remaining grace themselves.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "scheduler started: {} clusters, {} channel targets, cycle every {:?}",
            self.endpoints.len(),
            self.targets.configured_count(),
            self.cycle_interval
        );

        loop {
            tokio::select! {
                report = self.run_cycle() => {
                    debug!(
                        "cycle complete: {} ok / {} failed updates",
                        report.successes(),
                        report.failures()
                    );
                }
                _ = shutdown.changed() => {
                    info!("shutdown requested, abandoning in-flight cycle");
                    break;
                }
            }

            tokio::select! {
                _ = sleep(self.cycle_interval) => {}
                _ = shutdown.changed() => {
                    info!("shutdown requested during sleep");
                    break;
                }
            }
        }

        info!("scheduler stopped");
    }

    /// One full cycle. Fetch and probe fan out concurrently; merge waits
    /// for the complete set of per-region and per-endpoint outcomes,
    /// failures included, before dispatch consumes the merged view.
    pub async fn run_cycle(&self) -> DispatchReport {
        let (telemetry, latency) = tokio::join!(
            self.fetcher.fetch_all(&Region::ALL),
            self.probe.probe_all(&self.endpoints, self.probe_concurrency),
        );

        let fetched_regions = telemetry.values().filter(|r| r.is_ok()).count();
        debug!(
            "collected {}/{} regions, {} latency samples",
            fetched_regions,
            telemetry.len(),
            latency.len()
        );

        let statuses = merge(&telemetry, &latency, &self.endpoints);
        self.dispatcher.dispatch(&statuses, &self.targets).await
    }
}
