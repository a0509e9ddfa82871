//! On-demand query surface
//!
//! Synchronous request/response wrappers over the same fetch/probe code the
//! scheduler uses, so an interactive command (e.g. a slash command handler)
//! always observes the cycle's exact semantics. Presentation is up to the
//! caller; this module only returns data or an explicit "no data" error.

use std::collections::HashMap;
use std::str::FromStr;

use crate::config::ClusterEndpoint;
use crate::probe::{LatencyProbe, LatencySample};
use crate::status::canonical_id;
use crate::telemetry::{Region, TelemetryFetcher, UnknownRegion};

/// A single region, or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSelector {
    One(Region),
    All,
}

impl FromStr for RegionSelector {
    type Err = UnknownRegion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(RegionSelector::All)
        } else {
            s.parse::<Region>().map(RegionSelector::One)
        }
    }
}

impl RegionSelector {
    pub fn regions(&self) -> Vec<Region> {
        match self {
            RegionSelector::One(region) => vec![*region],
            RegionSelector::All => Region::ALL.to_vec(),
        }
    }
}

/// A single canonical server id, or every configured cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerSelector {
    One(String),
    All,
}

impl FromStr for ServerSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(ServerSelector::All)
        } else {
            Ok(ServerSelector::One(s.to_ascii_uppercase()))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Every selected source failed; distinct from an empty success.
    #[error("no data available")]
    NoData,
    #[error("unknown server: {0}")]
    UnknownServer(String),
}

/// Player counts of one region, codes already translated to canonical ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPlayers {
    pub region: Region,
    pub servers: Vec<(String, u64)>,
}

/// Latency of one configured cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPing {
    pub server_id: String,
    pub place: Option<String>,
    pub sample: LatencySample,
}

/// Fetch the latest player counts for the selected region(s). Failed
/// regions are dropped; if every selected region fails the result is an
/// explicit `NoData`, never an empty success.
pub async fn player_counts(
    fetcher: &TelemetryFetcher,
    selector: RegionSelector,
) -> Result<Vec<RegionPlayers>, QueryError> {
    let regions = selector.regions();
    let results = fetcher.fetch_all(&regions).await;

    let mut snapshots: Vec<RegionPlayers> = regions
        .iter()
        .filter_map(|region| {
            let entries = results.get(region)?.as_ref().ok()?;
            let servers = entries
                .iter()
                .map(|e| (canonical_id(&e.server_code).to_string(), e.players_online))
                .collect();
            Some(RegionPlayers { region: *region, servers })
        })
        .collect();

    if snapshots.is_empty() {
        return Err(QueryError::NoData);
    }
    snapshots.sort_by_key(|s| s.region);
    Ok(snapshots)
}

/// Probe the selected cluster(s) and return the samples. An unreachable
/// cluster is still a result; `NoData` only means nothing was probed at
/// all (no matching endpoint with an address).
pub async fn cluster_latency(
    probe: &LatencyProbe,
    endpoints: &[ClusterEndpoint],
    selector: ServerSelector,
    concurrency: usize,
) -> Result<Vec<ClusterPing>, QueryError> {
    let selected: Vec<ClusterEndpoint> = match &selector {
        ServerSelector::One(id) => {
            let endpoint = endpoints
                .iter()
                .find(|e| e.canonical_id() == Some(id.as_str()))
                .ok_or_else(|| QueryError::UnknownServer(id.clone()))?;
            vec![endpoint.clone()]
        }
        ServerSelector::All => endpoints.to_vec(),
    };

    let samples = probe.probe_all(&selected, concurrency).await;
    if samples.is_empty() {
        return Err(QueryError::NoData);
    }

    let places: HashMap<&str, &str> = selected
        .iter()
        .filter_map(|e| Some((e.canonical_id()?, e.place.as_deref()?)))
        .collect();

    let mut pings: Vec<ClusterPing> = samples
        .into_iter()
        .map(|(server_id, sample)| ClusterPing {
            place: places.get(server_id.as_str()).map(|p| p.to_string()),
            server_id,
            sample,
        })
        .collect();
    pings.sort_by(|a, b| a.server_id.cmp(&b.server_id));
    Ok(pings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use std::time::Duration;

    #[test]
    fn test_selector_parsing() {
        assert_eq!("ALL".parse::<RegionSelector>().unwrap(), RegionSelector::All);
        assert_eq!(
            "eu".parse::<RegionSelector>().unwrap(),
            RegionSelector::One(Region::Eu)
        );
        assert!("RU".parse::<RegionSelector>().is_err());

        assert_eq!("all".parse::<ServerSelector>().unwrap(), ServerSelector::All);
        assert_eq!(
            "eu3".parse::<ServerSelector>().unwrap(),
            ServerSelector::One("EU3".to_string())
        );
    }

    #[tokio::test]
    async fn test_all_failures_yield_no_data() {
        // No endpoints configured for any region: every fetch fails.
        let config = AgentConfig {
            api_urls: Default::default(),
            ..AgentConfig::default()
        };
        let fetcher = TelemetryFetcher::new(reqwest::Client::new(), &config);

        let result = player_counts(&fetcher, RegionSelector::All).await;
        assert!(matches!(result, Err(QueryError::NoData)));
    }

    #[tokio::test]
    async fn test_unknown_server_is_an_error() {
        let config = AgentConfig {
            probe_timeout: Duration::from_millis(100),
            ..AgentConfig::default()
        };
        let probe = LatencyProbe::new(&config);
        let result = cluster_latency(&probe, &[], ServerSelector::One("EU9".into()), 4).await;
        assert!(matches!(result, Err(QueryError::UnknownServer(id)) if id == "EU9"));
    }

    #[tokio::test]
    async fn test_unreachable_cluster_is_still_a_result() {
        let config = AgentConfig {
            probe_attempts: 1,
            probe_timeout: Duration::from_millis(100),
            ..AgentConfig::default()
        };
        let probe = LatencyProbe::new(&config);
        let endpoints = vec![ClusterEndpoint {
            api: Some("EU3".into()),
            name: None,
            place: Some("Amsterdam".into()),
            address: Some("eu3.host.invalid".into()),
        }];

        let pings = cluster_latency(&probe, &endpoints, ServerSelector::One("EU3".into()), 4)
            .await
            .unwrap();
        assert_eq!(pings.len(), 1);
        assert_eq!(pings[0].server_id, "EU3");
        assert_eq!(pings[0].place.as_deref(), Some("Amsterdam"));
        assert_eq!(pings[0].sample, LatencySample::Unreachable);
    }

    #[tokio::test]
    async fn test_no_probeable_endpoints_yield_no_data() {
        let config = AgentConfig::default();
        let probe = LatencyProbe::new(&config);
        // Endpoint without an address cannot be probed.
        let endpoints = vec![ClusterEndpoint {
            api: Some("EU3".into()),
            name: None,
            place: None,
            address: None,
        }];

        let result = cluster_latency(&probe, &endpoints, ServerSelector::All, 4).await;
        assert!(matches!(result, Err(QueryError::NoData)));
    }
}
