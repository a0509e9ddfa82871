//! Wargaming server status agent
//!
//! Periodically collects two telemetry signals and republishes them as
//! Discord channel names:
//! - Player counts per game server, fetched from the WG statistics API
//!   (one request per region)
//! - Round-trip latency to the configured game clusters, measured with
//!   TCP connect probes
//!
//! The scheduler merges both into a per-server status view each cycle and
//! hands it to the dispatcher, which renames the mapped channels under the
//! Discord rate limit.

pub mod config;
pub mod dispatch;
pub mod probe;
pub mod query;
pub mod scheduler;
pub mod sink;
pub mod status;
pub mod telemetry;
