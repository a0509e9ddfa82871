//! Cluster latency probing
//!
//! Unprivileged TCP-connect timing instead of ICMP echo: each attempt opens
//! a connection to port 80, measures wall-clock time to established, and
//! closes it immediately. Lower is still better and partial loss is
//! tolerated, so the contract matches a plain ping.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::{timeout, Instant};
use tracing::debug;

use crate::config::{AgentConfig, ClusterEndpoint};

/// Outcome of probing one cluster this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencySample {
    /// Mean RTT in milliseconds over the successful attempts.
    Rtt(f64),
    /// Resolution failed or no attempt succeeded.
    Unreachable,
}

impl fmt::Display for LatencySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Whole-number means keep one decimal ("100.0 ms"), matching
            // the labels existing channels already carry.
            LatencySample::Rtt(ms) if ms.fract() == 0.0 => write!(f, "{ms:.1} ms"),
            LatencySample::Rtt(ms) => write!(f, "{ms} ms"),
            LatencySample::Unreachable => f.write_str("unreachable"),
        }
    }
}

/// Measures round-trip latency to cluster endpoints.
#[derive(Debug, Clone)]
pub struct LatencyProbe {
    attempts: u32,
    attempt_timeout: Duration,
    port: u16,
}

impl LatencyProbe {
    /// Well-known port every cluster answers on.
    pub const PROBE_PORT: u16 = 80;

    pub fn new(config: &AgentConfig) -> Self {
        Self {
            attempts: config.probe_attempts,
            attempt_timeout: config.probe_timeout,
            port: Self::PROBE_PORT,
        }
    }

    /// Probe one address (`host` or `host:port`; a configured port is
    /// ignored, the probe always targets port 80).
    ///
    /// Resolution failure returns `Unreachable` without consuming any
    /// attempts. Otherwise the attempts run sequentially; refused, timed
    /// out, or errored connections contribute no timing sample.
    pub async fn probe(&self, address: &str) -> LatencySample {
        let hostname = address.split(':').next().unwrap_or(address);

        // Resolution is bounded like every other network call; a stalled
        // resolver counts as unreachable.
        let target = match timeout(self.attempt_timeout, lookup_host((hostname, self.port))).await {
            Ok(Ok(mut addrs)) => match addrs.next() {
                Some(addr) => addr,
                None => {
                    debug!("no address for {hostname}");
                    return LatencySample::Unreachable;
                }
            },
            Ok(Err(e)) => {
                debug!("could not resolve {hostname}: {e}");
                return LatencySample::Unreachable;
            }
            Err(_) => {
                debug!("resolving {hostname} timed out");
                return LatencySample::Unreachable;
            }
        };

        let mut total_ms = 0.0;
        let mut successes = 0u32;

        for _ in 0..self.attempts {
            let started = Instant::now();
            match timeout(self.attempt_timeout, TcpStream::connect(target)).await {
                Ok(Ok(stream)) => {
                    total_ms += started.elapsed().as_secs_f64() * 1000.0;
                    successes += 1;
                    drop(stream);
                }
                // Timeout, refusal, or any socket error: failed attempt.
                Ok(Err(_)) | Err(_) => continue,
            }
        }

        if successes == 0 {
            LatencySample::Unreachable
        } else {
            LatencySample::Rtt(round2(total_ms / successes as f64))
        }
    }

    /// Probe every endpoint that has an address and a canonical id,
    /// concurrently up to `concurrency` in flight. Each probe is isolated;
    /// one unreachable cluster never affects the others' samples.
    pub async fn probe_all(
        &self,
        endpoints: &[ClusterEndpoint],
        concurrency: usize,
    ) -> HashMap<String, LatencySample> {
        let targets: Vec<(String, String)> = endpoints
            .iter()
            .filter_map(|endpoint| {
                let id = endpoint.canonical_id()?.to_string();
                let address = endpoint.address.clone().filter(|a| !a.is_empty())?;
                Some((id, address))
            })
            .collect();

        stream::iter(targets)
            .map(|(id, address)| async move { (id, self.probe(&address).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }
}

/// Round to 2 decimal places, the precision the sink labels carry.
fn round2(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}
