//! Empty/full dwell tracking and chronic-issue classification.

use crate::model::{IssueType, OccupancyRecord, Snapshot};
use crate::pipeline::util::mean;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// A station-day is problematic above this share of empty (or full)
/// observations, in percent.
const ISSUE_THRESHOLD_PCT: f64 = 50.0;

struct OccupancyAcc {
    total: u64,
    empty: u64,
    full: u64,
    rates: Vec<f64>,
    capacity: Option<i64>,
    coordinates: [f64; 2],
}

/// Computes per-station-day occupancy statistics over cleaned snapshots.
///
/// A snapshot is empty when it has zero bikes and full when it reports zero
/// free docks; a missing dock count never counts as full. The occupancy
/// rate (`bikes / capacity * 100`) is a missing value whenever capacity is
/// absent or zero, so the rate statistics of a group may be absent while
/// its counts are not.
pub fn track_occupancy(snapshots: &[Snapshot]) -> Vec<OccupancyRecord> {
    let mut groups: BTreeMap<(String, String, NaiveDate), OccupancyAcc> = BTreeMap::new();

    for snap in snapshots {
        let key = (snap.station_code.clone(), snap.name.clone(), snap.date());
        let acc = groups.entry(key).or_insert_with(|| OccupancyAcc {
            total: 0,
            empty: 0,
            full: 0,
            rates: Vec::new(),
            capacity: snap.capacity,
            coordinates: [snap.longitude, snap.latitude],
        });

        acc.total += 1;
        if snap.num_bikes_available == 0 {
            acc.empty += 1;
        }
        if snap.num_docks_available == Some(0) {
            acc.full += 1;
        }
        if let Some(rate) = occupancy_rate(snap.num_bikes_available, snap.capacity) {
            acc.rates.push(rate);
        }
    }

    groups
        .into_iter()
        .map(|((station_code, name, date), acc)| {
            let empty_percentage = acc.empty as f64 / acc.total as f64 * 100.0;
            let full_percentage = acc.full as f64 / acc.total as f64 * 100.0;

            let has_rates = !acc.rates.is_empty();
            let min_rate = acc.rates.iter().copied().fold(f64::INFINITY, f64::min);
            let max_rate = acc.rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            OccupancyRecord {
                station_code,
                name,
                date,
                total_observations: acc.total,
                empty_count: acc.empty,
                full_count: acc.full,
                avg_occupancy_rate: has_rates.then(|| mean(&acc.rates)),
                min_occupancy_rate: has_rates.then_some(min_rate),
                max_occupancy_rate: has_rates.then_some(max_rate),
                empty_percentage,
                full_percentage,
                capacity: acc.capacity,
                coordinates: acc.coordinates,
                issue_type: classify_issue(empty_percentage, full_percentage),
            }
        })
        .collect()
}

/// The subset of station-days flagged with a chronic issue.
pub fn problematic_stations(records: &[OccupancyRecord]) -> Vec<OccupancyRecord> {
    records
        .iter()
        .filter(|r| r.issue_type.is_some())
        .cloned()
        .collect()
}

fn occupancy_rate(bikes: i64, capacity: Option<i64>) -> Option<f64> {
    match capacity {
        Some(cap) if cap > 0 => Some(bikes as f64 / cap as f64 * 100.0),
        _ => None,
    }
}

/// The simultaneous case is checked first; otherwise a station-day that is
/// chronically empty and chronically full at once could never be labeled
/// `BOTH`.
fn classify_issue(empty_pct: f64, full_pct: f64) -> Option<IssueType> {
    let empty = empty_pct > ISSUE_THRESHOLD_PCT;
    let full = full_pct > ISSUE_THRESHOLD_PCT;

    match (empty, full) {
        (true, true) => Some(IssueType::Both),
        (true, false) => Some(IssueType::FrequentlyEmpty),
        (false, true) => Some(IssueType::FrequentlyFull),
        (false, false) => None,
    }
}
