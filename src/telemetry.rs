//! Player-count telemetry from the WG statistics API
//!
//! One GET per region, all regions fetched concurrently. A region failure
//! (transport, timeout, bad payload) stays confined to that region; the
//! other regions' results are always returned.

use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AgentConfig;

/// Telemetry source region. There is deliberately no default region:
/// an unknown region string is an error everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Eu,
    Na,
    Asia,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Eu, Region::Na, Region::Asia];
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Eu => "EU",
            Region::Na => "NA",
            Region::Asia => "ASIA",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown region: {0}")]
pub struct UnknownRegion(pub String);

impl FromStr for Region {
    type Err = UnknownRegion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EU" => Ok(Region::Eu),
            "NA" => Ok(Region::Na),
            "ASIA" => Ok(Region::Asia),
            other => Err(UnknownRegion(other.to_string())),
        }
    }
}

/// One record from a region fetch, as delivered by the API: a
/// source-assigned server code and the current player count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTelemetryEntry {
    pub server_code: String,
    pub players_online: u64,
}

/// Per-region fetch failure. Format problems are handled exactly like
/// transport problems: the region yields no data this cycle.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status: {0}")]
    Status(reqwest::StatusCode),
    #[error("unexpected response shape: {0}")]
    Format(String),
    #[error("no API URL configured for region {0}")]
    UnknownEndpoint(Region),
}

pub type RegionResults = HashMap<Region, Result<Vec<RawTelemetryEntry>, FetchError>>;

/// Fetches per-region player counts over the shared HTTP client.
#[derive(Clone)]
pub struct TelemetryFetcher {
    client: reqwest::Client,
    application_id: String,
    api_urls: HashMap<Region, String>,
    timeout: Duration,
}

impl TelemetryFetcher {
    pub fn new(client: reqwest::Client, config: &AgentConfig) -> Self {
        Self {
            client,
            application_id: config.application_id.clone(),
            api_urls: config.api_urls.clone(),
            timeout: config.fetch_timeout,
        }
    }

    /// Fetch server stats for a single region.
    pub async fn fetch_region(&self, region: Region) -> Result<Vec<RawTelemetryEntry>, FetchError> {
        let url = self
            .api_urls
            .get(&region)
            .ok_or(FetchError::UnknownEndpoint(region))?;

        debug!("fetching telemetry for {region}");
        let response = self
            .client
            .get(url)
            .query(&[("application_id", self.application_id.as_str()), ("game", "wot")])
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let body: Value = response.json().await?;
        parse_response(&body)
    }

    /// Fetch all given regions concurrently. Never fails as a whole: each
    /// region carries its own result, and an error in one region does not
    /// suppress the others.
    pub async fn fetch_all(&self, regions: &[Region]) -> RegionResults {
        let fetches = regions.iter().map(|&region| async move {
            let result = self.fetch_region(region).await;
            if let Err(e) = &result {
                warn!("telemetry fetch failed for {region}: {e}");
            }
            (region, result)
        });

        join_all(fetches).await.into_iter().collect()
    }
}

/// Validate and flatten the WG payload:
/// `{status: "ok", data: {wot: [{server, players_online}, ...]}}`.
/// Anything else is a format error for the whole region.
pub fn parse_response(body: &Value) -> Result<Vec<RawTelemetryEntry>, FetchError> {
    if body.get("status").and_then(Value::as_str) != Some("ok") {
        return Err(FetchError::Format(format!(
            "status is not ok: {}",
            body.get("status").unwrap_or(&Value::Null)
        )));
    }

    let servers = body
        .get("data")
        .and_then(|d| d.get("wot"))
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Format("missing data.wot array".to_string()))?;

    servers
        .iter()
        .map(|entry| {
            let server_code = entry
                .get("server")
                .and_then(Value::as_str)
                .ok_or_else(|| FetchError::Format("entry without server code".to_string()))?;
            let players_online = entry
                .get("players_online")
                .and_then(Value::as_u64)
                .ok_or_else(|| FetchError::Format("entry without players_online".to_string()))?;
            Ok(RawTelemetryEntry { server_code: server_code.to_string(), players_online })
        })
        .collect()
}
