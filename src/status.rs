//! Merged per-server status view
//!
//! Pure joining logic, no I/O. Telemetry codes are translated to canonical
//! server ids through a static table; probe samples already arrive keyed by
//! canonical id. A server seen by only one source still gets a (partial)
//! status entry.

use std::collections::{BTreeMap, HashMap};

use crate::config::ClusterEndpoint;
use crate::probe::LatencySample;
use crate::telemetry::RegionResults;

/// Source-assigned server code -> canonical server id. Codes missing from
/// the table fall back to the raw code; on-demand queries rely on that
/// fallback, keep it.
pub const SERVER_CODE_MAPPING: &[(&str, &str)] = &[
    ("203", "EU3"),
    ("204", "EU4"),
    ("304", "LATAM"),
    ("303", "USC"),
    ("501", "ASIA"),
];

/// Translate a telemetry server code to its canonical id (identity
/// fallback for unmapped codes).
pub fn canonical_id(server_code: &str) -> &str {
    SERVER_CODE_MAPPING
        .iter()
        .find(|(code, _)| *code == server_code)
        .map(|(_, id)| *id)
        .unwrap_or(server_code)
}

/// Merged view for one canonical server id, rebuilt from scratch every
/// cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStatus {
    pub server_id: String,
    /// `None` when the server's region was not fetched or failed.
    pub players: Option<u64>,
    /// `None` when the server was not probed this cycle.
    pub latency: Option<LatencySample>,
    /// Location label from cluster configuration, when known.
    pub place: Option<String>,
}

/// Join telemetry and latency outcomes into one status per canonical id.
///
/// Deterministic: the output is sorted by server id and depends only on the
/// input mappings, so re-running with the same inputs yields an identical
/// set regardless of region processing order.
pub fn merge(
    telemetry: &RegionResults,
    latency: &HashMap<String, LatencySample>,
    endpoints: &[ClusterEndpoint],
) -> Vec<ServerStatus> {
    let places: HashMap<&str, &str> = endpoints
        .iter()
        .filter_map(|e| Some((e.canonical_id()?, e.place.as_deref()?)))
        .collect();

    let mut merged: BTreeMap<String, ServerStatus> = BTreeMap::new();

    for result in telemetry.values() {
        let Ok(entries) = result else { continue };
        for raw in entries {
            let id = canonical_id(&raw.server_code);
            status_entry(&mut merged, &places, id).players = Some(raw.players_online);
        }
    }

    for (id, sample) in latency {
        status_entry(&mut merged, &places, id).latency = Some(*sample);
    }

    merged.into_values().collect()
}

fn status_entry<'a>(
    merged: &'a mut BTreeMap<String, ServerStatus>,
    places: &HashMap<&str, &str>,
    id: &str,
) -> &'a mut ServerStatus {
    merged.entry(id.to_string()).or_insert_with(|| ServerStatus {
        server_id: id.to_string(),
        players: None,
        latency: None,
        place: places.get(id).map(|p| p.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{FetchError, RawTelemetryEntry, Region};

    fn entry(code: &str, players: u64) -> RawTelemetryEntry {
        RawTelemetryEntry { server_code: code.to_string(), players_online: players }
    }

    #[test]
    fn test_code_translation_with_identity_fallback() {
        assert_eq!(canonical_id("203"), "EU3");
        assert_eq!(canonical_id("501"), "ASIA");
        assert_eq!(canonical_id("999"), "999");
    }

    #[test]
    fn test_merge_joins_both_sources() {
        let telemetry: RegionResults =
            HashMap::from([(Region::Eu, Ok(vec![entry("203", 150)]))]);
        let latency = HashMap::from([("EU3".to_string(), LatencySample::Rtt(31.5))]);
        let endpoints = vec![ClusterEndpoint {
            api: Some("EU3".into()),
            name: None,
            place: Some("Amsterdam".into()),
            address: Some("eu3.example.com".into()),
        }];

        let statuses = merge(&telemetry, &latency, &endpoints);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].server_id, "EU3");
        assert_eq!(statuses[0].players, Some(150));
        assert_eq!(statuses[0].latency, Some(LatencySample::Rtt(31.5)));
        assert_eq!(statuses[0].place.as_deref(), Some("Amsterdam"));
    }

    #[test]
    fn test_partial_sources_produce_partial_status() {
        // EU3 only in telemetry, RU1 only probed.
        let telemetry: RegionResults =
            HashMap::from([(Region::Eu, Ok(vec![entry("203", 150)]))]);
        let latency = HashMap::from([("RU1".to_string(), LatencySample::Unreachable)]);

        let statuses = merge(&telemetry, &latency, &[]);
        assert_eq!(statuses.len(), 2);

        let eu3 = statuses.iter().find(|s| s.server_id == "EU3").unwrap();
        assert_eq!(eu3.players, Some(150));
        assert_eq!(eu3.latency, None);

        let ru1 = statuses.iter().find(|s| s.server_id == "RU1").unwrap();
        assert_eq!(ru1.players, None);
        assert_eq!(ru1.latency, Some(LatencySample::Unreachable));
    }

    #[test]
    fn test_failed_region_does_not_contaminate_others() {
        let telemetry: RegionResults = HashMap::from([
            (Region::Eu, Err(FetchError::Format("boom".into()))),
            (Region::Na, Ok(vec![entry("303", 77), entry("304", 12)])),
        ]);
        let statuses = merge(&telemetry, &HashMap::new(), &[]);

        let ids: Vec<&str> = statuses.iter().map(|s| s.server_id.as_str()).collect();
        assert_eq!(ids, vec!["LATAM", "USC"]);
        assert_eq!(statuses.iter().find(|s| s.server_id == "USC").unwrap().players, Some(77));
    }

    #[test]
    fn test_merge_is_order_independent_and_idempotent() {
        let forward: RegionResults = HashMap::from([
            (Region::Eu, Ok(vec![entry("203", 1), entry("204", 2)])),
            (Region::Asia, Ok(vec![entry("501", 3)])),
        ]);
        let latency = HashMap::from([
            ("EU3".to_string(), LatencySample::Rtt(20.0)),
            ("ASIA".to_string(), LatencySample::Rtt(200.0)),
        ]);

        let a = merge(&forward, &latency, &[]);
        let b = merge(&forward, &latency, &[]);
        assert_eq!(a, b);

        // Same inputs assembled in a different insertion order.
        let reversed: RegionResults = HashMap::from([
            (Region::Asia, Ok(vec![entry("501", 3)])),
            (Region::Eu, Ok(vec![entry("204", 2), entry("203", 1)])),
        ]);
        let c = merge(&reversed, &latency, &[]);
        assert_eq!(a, c);
    }
}
