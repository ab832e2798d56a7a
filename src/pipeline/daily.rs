//! Per-station daily aggregation.

use crate::model::{DailyAggregate, Snapshot};
use crate::pipeline::util::mean;
use chrono::NaiveDate;
use std::collections::BTreeMap;

struct DailyAcc {
    sum_bikes: i64,
    min_bikes: i64,
    max_bikes: i64,
    docks: Vec<f64>,
    count: u64,
    // First-seen representative values, in arrival order.
    capacity: Option<i64>,
    coordinates: [f64; 2],
}

/// Groups cleaned snapshots by (station, name, calendar day) and reduces
/// each group to summary statistics.
///
/// The calendar day comes from the timestamp's own embedded local time.
/// Capacity and coordinates are taken from the first row of each group in
/// arrival order ("first seen", nothing stronger). Rows missing a dock
/// count are excluded from the docks mean only. Output order follows the
/// grouping key, so identical input always yields identical output.
pub fn aggregate_daily(snapshots: &[Snapshot]) -> Vec<DailyAggregate> {
    let mut groups: BTreeMap<(String, String, NaiveDate), DailyAcc> = BTreeMap::new();

    for snap in snapshots {
        let key = (snap.station_code.clone(), snap.name.clone(), snap.date());
        let bikes = snap.num_bikes_available;

        let acc = groups.entry(key).or_insert_with(|| DailyAcc {
            sum_bikes: 0,
            min_bikes: bikes,
            max_bikes: bikes,
            docks: Vec::new(),
            count: 0,
            capacity: snap.capacity,
            coordinates: [snap.longitude, snap.latitude],
        });

        acc.sum_bikes += bikes;
        acc.min_bikes = acc.min_bikes.min(bikes);
        acc.max_bikes = acc.max_bikes.max(bikes);
        if let Some(docks) = snap.num_docks_available {
            acc.docks.push(docks as f64);
        }
        acc.count += 1;
    }

    groups
        .into_iter()
        .map(|((station_code, name, date), acc)| DailyAggregate {
            station_code,
            name,
            date,
            avg_bikes_available: acc.sum_bikes as f64 / acc.count as f64,
            min_bikes_available: acc.min_bikes,
            max_bikes_available: acc.max_bikes,
            avg_docks_available: (!acc.docks.is_empty()).then(|| mean(&acc.docks)),
            record_count: acc.count,
            capacity: acc.capacity,
            coordinates: acc.coordinates,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testutil::snapshot_at;

    #[test]
    fn test_single_station_single_day() {
        let snaps = vec![
            snapshot_at("101", "2024-01-15T08:00:00", 10),
            snapshot_at("101", "2024-01-15T09:00:00", 4),
            snapshot_at("101", "2024-01-15T10:00:00", 7),
        ];

        let daily = aggregate_daily(&snaps);

        assert_eq!(daily.len(), 1);
        let agg = &daily[0];
        assert_eq!(agg.station_code, "101");
        assert_eq!(agg.record_count, 3);
        assert_eq!(agg.min_bikes_available, 4);
        assert_eq!(agg.max_bikes_available, 10);
        assert_eq!(agg.avg_bikes_available, 7.0);
    }

    #[test]
    fn test_min_avg_max_ordering_holds() {
        let snaps = vec![
            snapshot_at("101", "2024-01-15T08:00:00", 2),
            snapshot_at("101", "2024-01-15T09:00:00", 9),
        ];

        let agg = &aggregate_daily(&snaps)[0];
        assert!(agg.min_bikes_available as f64 <= agg.avg_bikes_available);
        assert!(agg.avg_bikes_available <= agg.max_bikes_available as f64);
    }

    #[test]
    fn test_splits_groups_across_days() {
        let snaps = vec![
            snapshot_at("101", "2024-01-15T23:00:00", 5),
            snapshot_at("101", "2024-01-16T00:30:00", 5),
        ];

        let daily = aggregate_daily(&snaps);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].record_count, 1);
        assert_eq!(daily[1].record_count, 1);
    }

    #[test]
    fn test_capacity_and_coordinates_are_first_seen() {
        let mut first = snapshot_at("101", "2024-01-15T08:00:00", 5);
        first.capacity = Some(30);
        first.longitude = 2.35;
        first.latitude = 48.85;
        let mut second = snapshot_at("101", "2024-01-15T09:00:00", 5);
        second.capacity = Some(99);

        let daily = aggregate_daily(&[first, second]);

        assert_eq!(daily[0].capacity, Some(30));
        assert_eq!(daily[0].coordinates, [2.35, 48.85]);
    }

    #[test]
    fn test_missing_docks_excluded_from_docks_mean() {
        let mut a = snapshot_at("101", "2024-01-15T08:00:00", 5);
        a.num_docks_available = Some(10);
        let mut b = snapshot_at("101", "2024-01-15T09:00:00", 5);
        b.num_docks_available = None;

        let daily = aggregate_daily(&[a, b]);

        assert_eq!(daily[0].avg_docks_available, Some(10.0));
        assert_eq!(daily[0].record_count, 2);
    }
}
