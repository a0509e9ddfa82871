//! Rate-limited status dispatch
//!
//! Pushes the merged statuses to the sink, two renames per server (players
//! channel, ping channel). The 5 s spacing between consecutive sink calls
//! is a hard upstream rate limit and is enforced globally through a
//! mutex-guarded last-call timestamp, never per task.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use crate::config::{AgentConfig, ChannelTargets};
use crate::probe::LatencySample;
use crate::sink::Sink;
use crate::status::ServerStatus;

/// Which of a server's two channels an update went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Players,
    Ping,
}

/// One attempted sink call.
#[derive(Debug, Clone)]
pub struct DispatchEntry {
    pub server_id: String,
    pub channel: ChannelKind,
    pub success: bool,
    pub error: Option<String>,
}

/// Per-cycle dispatch outcome, kept for observability only.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub started_at: DateTime<Utc>,
    pub entries: Vec<DispatchEntry>,
}

impl DispatchReport {
    pub fn successes(&self) -> usize {
        self.entries.iter().filter(|e| e.success).count()
    }

    pub fn failures(&self) -> usize {
        self.entries.len() - self.successes()
    }
}

/// Serialized, paced writer to the notification sink.
pub struct UpdateDispatcher<S> {
    sink: S,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl<S: Sink> UpdateDispatcher<S> {
    pub fn new(sink: S, config: &AgentConfig) -> Self {
        Self { sink, min_interval: config.sink_spacing, last_call: Mutex::new(None) }
    }

    /// Push every status with a configured target to the sink. A failed
    /// rename is logged and skipped; the remaining targets are still
    /// attempted.
    pub async fn dispatch(
        &self,
        statuses: &[ServerStatus],
        targets: &ChannelTargets,
    ) -> DispatchReport {
        let mut report = DispatchReport { started_at: Utc::now(), entries: Vec::new() };

        for status in statuses {
            let Some(pair) = targets.get(&status.server_id) else { continue };

            if let Some(channel) = &pair.players {
                let label = players_label(status);
                report.entries.push(self.send(status, ChannelKind::Players, channel, &label).await);
            }
            if let Some(channel) = &pair.ping {
                let label = ping_label(status);
                report.entries.push(self.send(status, ChannelKind::Ping, channel, &label).await);
            }
        }

        info!(
            "dispatch finished: {} updates sent, {} failed",
            report.successes(),
            report.failures()
        );
        report
    }

    async fn send(
        &self,
        status: &ServerStatus,
        channel: ChannelKind,
        destination: &str,
        label: &str,
    ) -> DispatchEntry {
        self.pace().await;

        match self.sink.rename(destination, label).await {
            Ok(()) => DispatchEntry {
                server_id: status.server_id.clone(),
                channel,
                success: true,
                error: None,
            },
            Err(e) => {
                warn!("failed to update {:?} channel for {}: {e}", channel, status.server_id);
                DispatchEntry {
                    server_id: status.server_id.clone(),
                    channel,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Wait until the minimum spacing since the previous sink call has
    /// elapsed, then claim the slot. The lock is held across the wait so
    /// calls stay strictly sequential.
    async fn pace(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            sleep_until(previous + self.min_interval).await;
        }
        *last = Some(Instant::now());
    }
}

/// `"EU3 Players: 150"`, `"EU3 Players: N/A"` when the count is unknown.
fn players_label(status: &ServerStatus) -> String {
    match status.players {
        Some(count) => format!("{} Players: {count}", status.server_id),
        None => format!("{} Players: N/A", status.server_id),
    }
}

/// `"EU3 Ping: 31.5 ms"`, `"EU3 Ping: Error"` when unreachable or not
/// probed.
fn ping_label(status: &ServerStatus) -> String {
    match status.latency {
        Some(sample @ LatencySample::Rtt(_)) => format!("{} Ping: {sample}", status.server_id),
        Some(LatencySample::Unreachable) | None => format!("{} Ping: Error", status.server_id),
    }
}
