//! Agent configuration
//!
//! Three independent sources, loaded once at startup:
//! - Credentials and channel targets from environment variables (`.env`
//!   supported via dotenvy)
//! - The game cluster list from `clusters.json`
//! - Timing knobs with fixed defaults

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::telemetry::Region;

/// Env var value marking a channel slot as intentionally unconfigured.
pub const CHANNEL_PLACEHOLDER: &str = "CHANNEL_ID";

/// Server ids probed for `{ID}_PLAYERS_CHANNEL_ID` / `{ID}_PING_CHANNEL_ID`
/// environment variables.
pub const KNOWN_SERVER_IDS: &[&str] = &[
    "EU1", "EU2", "EU3", "EU4", "LATAM", "USC", "RU1", "RU2", "RU4", "RU6", "RU7", "RU8", "RU9",
    "PT1", "CH1", "CH2", "ASIA", "CT1", "CT2", "PCW0", "PCW1", "PCW2", "XVM",
];

/// Startup configuration errors. These are the only errors allowed to stop
/// the process; everything after startup degrades to partial data instead.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingCredential(&'static str),
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub application_id: String,
    pub bot_token: String,
    /// WG statistics API endpoint per region.
    pub api_urls: HashMap<Region, String>,
    pub discord_api_base: String,
    /// Full fetch-probe-merge-dispatch period.
    pub cycle_interval: Duration,
    /// Minimum spacing between two Discord calls (hard API rate limit).
    pub sink_spacing: Duration,
    pub fetch_timeout: Duration,
    /// Per-call bound on sink renames so a stalled call can never block
    /// the dispatcher, and with it the cycle.
    pub sink_timeout: Duration,
    pub probe_attempts: u32,
    pub probe_timeout: Duration,
    /// Cap on concurrent latency probes across all clusters.
    pub probe_concurrency: usize,
    /// How long shutdown waits for the in-flight cycle before abandoning it.
    pub shutdown_grace: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            application_id: String::new(),
            bot_token: String::new(),
            api_urls: default_api_urls(),
            discord_api_base: "https://discord.com/api/v10".to_string(),
            cycle_interval: Duration::from_secs(300),
            sink_spacing: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
            sink_timeout: Duration::from_secs(10),
            probe_attempts: 4,
            probe_timeout: Duration::from_secs(2),
            probe_concurrency: 16,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

fn default_api_urls() -> HashMap<Region, String> {
    HashMap::from([
        (Region::Eu, "https://api.worldoftanks.eu/wgn/servers/info/".to_string()),
        (Region::Na, "https://api.worldoftanks.com/wgn/servers/info/".to_string()),
        (Region::Asia, "https://api.worldoftanks.asia/wgn/servers/info/".to_string()),
    ])
}

impl AgentConfig {
    /// Load configuration from the environment. Missing credentials are
    /// fatal here so they can never surface mid-cycle.
    pub fn from_env() -> Result<Self, ConfigError> {
        let application_id = std::env::var("WG_APPLICATION_ID")
            .map_err(|_| ConfigError::MissingCredential("WG_APPLICATION_ID"))?;
        let bot_token = std::env::var("DISCORD_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingCredential("DISCORD_BOT_TOKEN"))?;

        Ok(Self { application_id, bot_token, ..Self::default() })
    }
}

/// One game cluster from `clusters.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterEndpoint {
    /// Canonical server id, joins against telemetry and channel targets.
    #[serde(default)]
    pub api: Option<String>,
    /// Fallback label when `api` is absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Human-readable location.
    #[serde(default)]
    pub place: Option<String>,
    /// `host` or `host:port`; the port part is ignored by the probe.
    #[serde(default)]
    pub address: Option<String>,
}

impl ClusterEndpoint {
    /// Canonical id used as the join key, `api` first, `name` as fallback.
    pub fn canonical_id(&self) -> Option<&str> {
        self.api
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.name.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Deserialize)]
struct ClustersFile {
    list: Vec<ClusterEndpoint>,
}

/// Load the cluster list. A missing or unparseable file yields an empty
/// set (probing simply produces no samples), never a startup failure.
pub async fn load_clusters(path: impl AsRef<Path>) -> Vec<ClusterEndpoint> {
    let path = path.as_ref();
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            warn!("could not read {}: {e}, starting with no clusters", path.display());
            return Vec::new();
        }
    };

    match serde_json::from_str::<ClustersFile>(&content) {
        Ok(file) => file.list,
        Err(e) => {
            warn!("could not parse {}: {e}, starting with no clusters", path.display());
            Vec::new()
        }
    }
}

/// Discord channel pair for one server id. `None` means the slot is not
/// configured and must be skipped silently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelPair {
    pub players: Option<String>,
    pub ping: Option<String>,
}

/// Server id -> channel pair mapping, resolved from environment variables.
#[derive(Debug, Clone, Default)]
pub struct ChannelTargets {
    targets: HashMap<String, ChannelPair>,
}

impl ChannelTargets {
    /// Resolve `{ID}_PLAYERS_CHANNEL_ID` / `{ID}_PING_CHANNEL_ID` for every
    /// known server id. Absent vars and the reserved placeholder both mean
    /// "not configured".
    pub fn from_env() -> Self {
        let mut targets = HashMap::new();
        for id in KNOWN_SERVER_IDS {
            let pair = ChannelPair {
                players: channel_var(&format!("{id}_PLAYERS_CHANNEL_ID")),
                ping: channel_var(&format!("{id}_PING_CHANNEL_ID")),
            };
            targets.insert(id.to_string(), pair);
        }
        Self { targets }
    }

    pub fn from_map(targets: HashMap<String, ChannelPair>) -> Self {
        Self { targets }
    }

    pub fn get(&self, server_id: &str) -> Option<&ChannelPair> {
        self.targets.get(server_id)
    }

    /// Number of servers with at least one configured channel.
    pub fn configured_count(&self) -> usize {
        self.targets
            .values()
            .filter(|p| p.players.is_some() || p.ping.is_some())
            .count()
    }
}

fn channel_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty() && v != CHANNEL_PLACEHOLDER)
}
