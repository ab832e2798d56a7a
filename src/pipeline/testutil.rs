//! Shared snapshot builders for stage tests.

use crate::model::{RawSnapshot, Snapshot};
use chrono::NaiveDateTime;

fn ts(value: &str) -> NaiveDateTime {
    value.parse().expect("test timestamp must be ISO-8601")
}

/// A cleaned snapshot with sensible defaults and an explicit bike count.
pub fn snapshot_at(code: &str, timestamp: &str, bikes: i64) -> Snapshot {
    Snapshot {
        station_code: code.to_string(),
        name: format!("Station {}", code),
        timestamp: ts(timestamp),
        num_bikes_available: bikes,
        num_docks_available: Some((20 - bikes).max(0)),
        capacity: Some(20),
        longitude: 2.3522,
        latitude: 48.8566,
    }
}

/// A raw snapshot with an optional bike count, for incident-stage tests.
pub fn raw_at(code: &str, timestamp: &str, bikes: Option<i64>) -> RawSnapshot {
    RawSnapshot {
        station_code: Some(code.to_string()),
        name: Some(format!("Station {}", code)),
        timestamp: ts(timestamp),
        num_bikes_available: bikes,
        num_docks_available: bikes.map(|b| (20 - b).max(0)),
        capacity: Some(20),
        longitude: 2.3522,
        latitude: 48.8566,
        is_installed: true,
    }
}
