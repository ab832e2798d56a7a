//! Fleet-wide statistics.

use crate::model::{GlobalStatistics, Snapshot};
use std::collections::BTreeSet;

/// Single ungrouped aggregation over the cleaned set: distinct station
/// count, availability totals, and per-observation means.
///
/// The means are taken over observations (the same weighting the totals
/// carry), with missing dock counts excluded from the docks mean.
pub fn compute_global_stats(snapshots: &[Snapshot]) -> GlobalStatistics {
    let stations: BTreeSet<&str> = snapshots.iter().map(|s| s.station_code.as_str()).collect();

    let total_bikes: i64 = snapshots.iter().map(|s| s.num_bikes_available).sum();
    let docks: Vec<i64> = snapshots
        .iter()
        .filter_map(|s| s.num_docks_available)
        .collect();
    let total_docks: i64 = docks.iter().sum();

    let avg_bikes_per_station = if snapshots.is_empty() {
        0.0
    } else {
        total_bikes as f64 / snapshots.len() as f64
    };
    let avg_docks_per_station = if docks.is_empty() {
        0.0
    } else {
        total_docks as f64 / docks.len() as f64
    };

    GlobalStatistics {
        total_stations: stations.len() as u64,
        total_bikes,
        total_docks,
        avg_bikes_per_station,
        avg_docks_per_station,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testutil::snapshot_at;

    #[test]
    fn test_distinct_station_count() {
        let snaps = vec![
            snapshot_at("101", "2024-01-15T08:00:00", 3),
            snapshot_at("101", "2024-01-15T09:00:00", 4),
            snapshot_at("202", "2024-01-15T08:00:00", 5),
        ];

        let stats = compute_global_stats(&snaps);

        assert_eq!(stats.total_stations, 2);
        assert_eq!(stats.total_bikes, 12);
        assert_eq!(stats.avg_bikes_per_station, 4.0);
    }

    #[test]
    fn test_empty_input_yields_zeros() {
        let stats = compute_global_stats(&[]);

        assert_eq!(stats.total_stations, 0);
        assert_eq!(stats.total_bikes, 0);
        assert_eq!(stats.total_docks, 0);
        assert_eq!(stats.avg_bikes_per_station, 0.0);
        assert_eq!(stats.avg_docks_per_station, 0.0);
    }

    #[test]
    fn test_missing_docks_excluded_from_docks_mean() {
        let mut a = snapshot_at("101", "2024-01-15T08:00:00", 1);
        a.num_docks_available = Some(10);
        let mut b = snapshot_at("202", "2024-01-15T08:00:00", 1);
        b.num_docks_available = None;

        let stats = compute_global_stats(&[a, b]);

        assert_eq!(stats.total_docks, 10);
        assert_eq!(stats.avg_docks_per_station, 10.0);
    }
}
