//! Hour-of-day usage patterns.

use crate::model::{HourlyPattern, Snapshot};
use crate::pipeline::util::mean;
use std::collections::BTreeMap;

struct HourlyAcc {
    bikes: Vec<f64>,
    docks: Vec<f64>,
    count: u64,
}

/// Groups cleaned snapshots by (station, name, hour of day) across all days
/// and computes mean availability per group.
///
/// The result is sorted ascending by (station code, hour). Consumers rely
/// on that ordering; it is part of the output contract, not cosmetic.
pub fn analyze_hourly(snapshots: &[Snapshot]) -> Vec<HourlyPattern> {
    let mut groups: BTreeMap<(String, String, u32), HourlyAcc> = BTreeMap::new();

    for snap in snapshots {
        let key = (snap.station_code.clone(), snap.name.clone(), snap.hour());
        let acc = groups.entry(key).or_insert_with(|| HourlyAcc {
            bikes: Vec::new(),
            docks: Vec::new(),
            count: 0,
        });

        acc.bikes.push(snap.num_bikes_available as f64);
        if let Some(docks) = snap.num_docks_available {
            acc.docks.push(docks as f64);
        }
        acc.count += 1;
    }

    let mut patterns: Vec<HourlyPattern> = groups
        .into_iter()
        .map(|((station_code, name, hour), acc)| HourlyPattern {
            station_code,
            name,
            hour,
            avg_bikes: mean(&acc.bikes),
            avg_docks: (!acc.docks.is_empty()).then(|| mean(&acc.docks)),
            observations: acc.count,
        })
        .collect();

    patterns.sort_by(|a, b| {
        (a.station_code.as_str(), a.hour).cmp(&(b.station_code.as_str(), b.hour))
    });

    patterns
}
