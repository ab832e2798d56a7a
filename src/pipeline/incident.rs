//! Operational incident classification.
//!
//! Three classifiers run over the raw (uncleaned) snapshot set and their
//! results are unioned into one flat collection:
//!
//! - `OFFLINE`: snapshots reporting the station as not installed.
//! - `CAPACITY_ANOMALY`: zero or implausibly large capacity readings.
//! - `BRUTAL_CHANGE`: abrupt bike-count swings between consecutive readings.
//!
//! Rows without a station code cannot be keyed and are dropped here; the
//! rest of the raw set stays in play even when cleaning would discard it.

use crate::model::{IncidentRecord, IncidentType, RawSnapshot};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// Capacities above this are treated as suspect readings. Policy constant,
/// not a physical limit.
const MAX_PLAUSIBLE_CAPACITY: i64 = 100;

/// A consecutive bike-count delta strictly above this counts as brutal.
const BRUTAL_CHANGE_THRESHOLD: i64 = 20;

type DayKey<'a> = (&'a str, &'a str, NaiveDate);

struct OfflineAcc {
    count: u64,
    first: NaiveDateTime,
    last: NaiveDateTime,
}

struct CapacityAcc {
    count: u64,
    suspect: i64,
}

struct ChangeAcc {
    deltas: Vec<i64>,
}

/// Classifies incidents over the raw snapshot set and returns the flat
/// union, sorted by (station, date, type).
pub fn detect_incidents(raw: &[RawSnapshot]) -> Vec<IncidentRecord> {
    let keyed: Vec<&RawSnapshot> = raw
        .iter()
        .filter(|s| s.station_code.as_deref().is_some_and(|c| !c.trim().is_empty()))
        .collect();

    let mut incidents = Vec::new();
    incidents.extend(detect_offline(&keyed));
    incidents.extend(detect_capacity_anomalies(&keyed));
    incidents.extend(detect_brutal_changes(&keyed));

    incidents.sort_by(|a, b| {
        (a.station_code.as_str(), a.date, a.incident_type)
            .cmp(&(b.station_code.as_str(), b.date, b.incident_type))
    });

    incidents
}

// Codes are trimmed so a padded reading groups with its station, the same
// normalization cleaning applies.
fn key(snap: &RawSnapshot) -> DayKey<'_> {
    (
        snap.station_code.as_deref().unwrap_or_default().trim(),
        snap.name.as_deref().unwrap_or_default(),
        snap.date(),
    )
}

/// Station-days where the station reported itself as not installed,
/// with the first and last such reading retained for diagnostics.
fn detect_offline(keyed: &[&RawSnapshot]) -> Vec<IncidentRecord> {
    let mut groups: BTreeMap<DayKey<'_>, OfflineAcc> = BTreeMap::new();

    for snap in keyed.iter().copied().filter(|s| !s.is_installed) {
        let acc = groups.entry(key(snap)).or_insert_with(|| OfflineAcc {
            count: 0,
            first: snap.timestamp,
            last: snap.timestamp,
        });
        acc.count += 1;
        acc.first = acc.first.min(snap.timestamp);
        acc.last = acc.last.max(snap.timestamp);
    }

    groups
        .into_iter()
        .map(|((station_code, name, date), acc)| IncidentRecord {
            station_code: station_code.to_string(),
            name: name.to_string(),
            date,
            incident_type: IncidentType::Offline,
            incident_count: acc.count,
            first_offline: Some(acc.first),
            last_offline: Some(acc.last),
            suspect_capacity: None,
            max_change: None,
            avg_change: None,
        })
        .collect()
}

/// Station-days with a zero or implausibly large capacity reading. The
/// first suspect value seen stands in as the representative.
fn detect_capacity_anomalies(keyed: &[&RawSnapshot]) -> Vec<IncidentRecord> {
    let mut groups: BTreeMap<DayKey<'_>, CapacityAcc> = BTreeMap::new();

    for snap in keyed.iter().copied() {
        let Some(capacity) = snap.capacity else {
            continue;
        };
        if capacity != 0 && capacity <= MAX_PLAUSIBLE_CAPACITY {
            continue;
        }

        let acc = groups.entry(key(snap)).or_insert_with(|| CapacityAcc {
            count: 0,
            suspect: capacity,
        });
        acc.count += 1;
    }

    groups
        .into_iter()
        .map(|((station_code, name, date), acc)| IncidentRecord {
            station_code: station_code.to_string(),
            name: name.to_string(),
            date,
            incident_type: IncidentType::CapacityAnomaly,
            incident_count: acc.count,
            first_offline: None,
            last_offline: None,
            suspect_capacity: Some(acc.suspect),
            max_change: None,
            avg_change: None,
        })
        .collect()
}

/// Station-days with consecutive bike-count swings above the threshold.
///
/// Each station's readings are sorted by timestamp and scanned pairwise;
/// a delta is attributed to the day of the later reading. A station's first
/// reading has no predecessor and can never fire.
fn detect_brutal_changes(keyed: &[&RawSnapshot]) -> Vec<IncidentRecord> {
    let mut series: BTreeMap<(&str, &str), Vec<&RawSnapshot>> = BTreeMap::new();
    for snap in keyed.iter().copied().filter(|s| s.num_bikes_available.is_some()) {
        series
            .entry((
                snap.station_code.as_deref().unwrap_or_default().trim(),
                snap.name.as_deref().unwrap_or_default(),
            ))
            .or_default()
            .push(snap);
    }

    let mut groups: BTreeMap<DayKey<'_>, ChangeAcc> = BTreeMap::new();

    for ((station_code, name), mut snaps) in series {
        snaps.sort_by_key(|s| s.timestamp);

        for pair in snaps.windows(2) {
            let prev = pair[0].num_bikes_available.unwrap_or_default();
            let curr = pair[1].num_bikes_available.unwrap_or_default();
            let delta = (curr - prev).abs();
            if delta <= BRUTAL_CHANGE_THRESHOLD {
                continue;
            }

            groups
                .entry((station_code, name, pair[1].date()))
                .or_insert_with(|| ChangeAcc { deltas: Vec::new() })
                .deltas
                .push(delta);
        }
    }

    groups
        .into_iter()
        .map(|((station_code, name, date), acc)| {
            let max = acc.deltas.iter().copied().max().unwrap_or_default();
            let sum: i64 = acc.deltas.iter().sum();
            let avg = sum as f64 / acc.deltas.len() as f64;

            IncidentRecord {
                station_code: station_code.to_string(),
                name: name.to_string(),
                date,
                incident_type: IncidentType::BrutalChange,
                incident_count: acc.deltas.len() as u64,
                first_offline: None,
                last_offline: None,
                suspect_capacity: None,
                max_change: Some(max),
                avg_change: Some(avg),
            }
        })
        .collect()
}
