//! Low-variability station detection.
//!
//! A station whose bike count barely moves between consecutive readings is
//! suspect: a stuck sensor, or a station pinned empty/full without being
//! flagged elsewhere.

use crate::model::{AnomalyRecord, Snapshot};
use crate::pipeline::util::{abs_deltas, mean, stddev};
use std::collections::BTreeMap;

/// A station qualifies as anomalous below this mean absolute delta.
/// Policy constant, not a derived model.
const AVG_CHANGE_THRESHOLD: f64 = 0.5;

/// Flags stations whose mean absolute bike-count change between
/// chronologically consecutive snapshots is below the threshold.
///
/// Each station's snapshots are sorted by timestamp before the pairwise
/// scan. A station with a single observation has no delta to average and is
/// excluded outright rather than emitted with a spurious zero.
pub fn detect_anomalies(snapshots: &[Snapshot]) -> Vec<AnomalyRecord> {
    let mut series: BTreeMap<(&str, &str), Vec<&Snapshot>> = BTreeMap::new();
    for snap in snapshots {
        series
            .entry((snap.station_code.as_str(), snap.name.as_str()))
            .or_default()
            .push(snap);
    }

    let mut anomalies = Vec::new();

    for ((station_code, name), mut snaps) in series {
        snaps.sort_by_key(|s| s.timestamp);

        let bikes: Vec<i64> = snaps.iter().map(|s| s.num_bikes_available).collect();
        let deltas = abs_deltas(&bikes);
        if deltas.is_empty() {
            continue;
        }

        let delta_f: Vec<f64> = deltas.iter().map(|d| *d as f64).collect();
        let avg_change = mean(&delta_f);
        if avg_change >= AVG_CHANGE_THRESHOLD {
            continue;
        }

        let bikes_f: Vec<f64> = bikes.iter().map(|b| *b as f64).collect();
        let bikes_mean = mean(&bikes_f);

        anomalies.push(AnomalyRecord {
            station_code: station_code.to_string(),
            name: name.to_string(),
            avg_change,
            std_dev_bikes: stddev(&bikes_f, bikes_mean),
        });
    }

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testutil::snapshot_at;

    #[test]
    fn test_constant_station_is_flagged() {
        // bikes=[10,10,10,10] over 4 hours: avgChange = 0, under threshold.
        let snaps = vec![
            snapshot_at("101", "2024-01-15T08:00:00", 10),
            snapshot_at("101", "2024-01-15T09:00:00", 10),
            snapshot_at("101", "2024-01-15T10:00:00", 10),
            snapshot_at("101", "2024-01-15T11:00:00", 10),
        ];

        let anomalies = detect_anomalies(&snaps);

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].station_code, "101");
        assert_eq!(anomalies[0].avg_change, 0.0);
        assert_eq!(anomalies[0].std_dev_bikes, 0.0);
    }

    #[test]
    fn test_active_station_is_not_flagged() {
        let snaps = vec![
            snapshot_at("101", "2024-01-15T08:00:00", 2),
            snapshot_at("101", "2024-01-15T09:00:00", 12),
            snapshot_at("101", "2024-01-15T10:00:00", 5),
        ];

        assert!(detect_anomalies(&snaps).is_empty());
    }

    #[test]
    fn test_single_observation_station_excluded() {
        let snaps = vec![snapshot_at("101", "2024-01-15T08:00:00", 10)];
        assert!(detect_anomalies(&snaps).is_empty());
    }

    #[test]
    fn test_scan_sorts_by_timestamp_first() {
        // Arrival order is shuffled; chronological deltas are all zero even
        // though adjacent arrival rows differ.
        let snaps = vec![
            snapshot_at("101", "2024-01-15T10:00:00", 7),
            snapshot_at("101", "2024-01-15T08:00:00", 7),
            snapshot_at("101", "2024-01-15T09:00:00", 7),
        ];

        let anomalies = detect_anomalies(&snaps);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].avg_change, 0.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        // Deltas [1, 0]: avgChange = 0.5, not strictly below the threshold.
        let snaps = vec![
            snapshot_at("101", "2024-01-15T08:00:00", 10),
            snapshot_at("101", "2024-01-15T09:00:00", 11),
            snapshot_at("101", "2024-01-15T10:00:00", 11),
        ];

        assert!(detect_anomalies(&snaps).is_empty());
    }
}
