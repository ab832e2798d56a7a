//! Snapshot and derived-record types for the station analytics pipeline.
//!
//! `RawSnapshot` mirrors the archive/wire schema one-to-one (camelCase,
//! optional fields left optional). `Snapshot` is the cleaned form with the
//! required fields guaranteed by construction. Everything else is an output
//! record produced by one pipeline stage and serialized as a flat document.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// One observation of one station at one instant, as archived.
///
/// Timestamps are kept in the instant's own embedded local time; the
/// pipeline never normalizes them to a common zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSnapshot {
    pub station_code: Option<String>,
    pub name: Option<String>,
    pub timestamp: NaiveDateTime,
    pub num_bikes_available: Option<i64>,
    pub num_docks_available: Option<i64>,
    pub capacity: Option<i64>,
    pub longitude: f64,
    pub latitude: f64,
    pub is_installed: bool,
}

impl RawSnapshot {
    /// Promotes a raw snapshot to a cleaned one.
    ///
    /// Returns `None` when the station code is missing/empty or the bike
    /// count is absent; docks and capacity stay optional and are skipped by
    /// whichever stage needs them.
    pub fn clean(&self) -> Option<Snapshot> {
        let station_code = self.station_code.as_deref()?.trim();
        if station_code.is_empty() {
            return None;
        }
        let num_bikes_available = self.num_bikes_available?;

        Some(Snapshot {
            station_code: station_code.to_string(),
            name: self.name.clone().unwrap_or_default(),
            timestamp: self.timestamp,
            num_bikes_available,
            num_docks_available: self.num_docks_available,
            capacity: self.capacity,
            longitude: self.longitude,
            latitude: self.latitude,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// A cleaned snapshot: station code and bike count are always present.
///
/// The operational-status flag stays on [`RawSnapshot`] only; offline
/// detection runs over the raw set, so the cleaned stages never read it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub station_code: String,
    pub name: String,
    pub timestamp: NaiveDateTime,
    pub num_bikes_available: i64,
    pub num_docks_available: Option<i64>,
    pub capacity: Option<i64>,
    pub longitude: f64,
    pub latitude: f64,
}

impl Snapshot {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }
}

/// Per-station per-day summary written to `stations_aggregated`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub station_code: String,
    pub name: String,
    pub date: NaiveDate,
    pub avg_bikes_available: f64,
    pub min_bikes_available: i64,
    pub max_bikes_available: i64,
    pub avg_docks_available: Option<f64>,
    pub record_count: u64,
    pub capacity: Option<i64>,
    /// `[longitude, latitude]`, first seen within the group.
    pub coordinates: [f64; 2],
}

/// Per-station per-hour-of-day usage pattern, across all days in the input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyPattern {
    pub station_code: String,
    pub name: String,
    pub hour: u32,
    pub avg_bikes: f64,
    pub avg_docks: Option<f64>,
    pub observations: u64,
}

/// A station whose bike count barely moves between consecutive readings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyRecord {
    pub station_code: String,
    pub name: String,
    /// Mean of `|bikes - previous bikes|` over consecutive readings.
    pub avg_change: f64,
    /// Population standard deviation of the raw bike counts.
    pub std_dev_bikes: f64,
}

/// Operational incident class attributed to a station-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentType {
    Offline,
    CapacityAnomaly,
    BrutalChange,
}

/// One classified incident for a (station, date, type) key.
///
/// The per-type diagnostic fields are populated only for their own class
/// and omitted from the serialized document otherwise.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    pub station_code: String,
    pub name: String,
    pub date: NaiveDate,
    pub incident_type: IncidentType,
    pub incident_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_offline: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_offline: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspect_capacity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_change: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_change: Option<f64>,
}

/// Chronic availability problem for a station-day in the problematic subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    FrequentlyEmpty,
    FrequentlyFull,
    Both,
}

/// Empty/full dwell statistics for a station-day, written to
/// `stations_empty_full_tracking` (and, when an issue is flagged, to
/// `problematic_stations`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyRecord {
    pub station_code: String,
    pub name: String,
    pub date: NaiveDate,
    pub total_observations: u64,
    pub empty_count: u64,
    pub full_count: u64,
    /// Occupancy rate statistics are absent when no snapshot in the group
    /// carried a usable (non-zero) capacity.
    pub avg_occupancy_rate: Option<f64>,
    pub min_occupancy_rate: Option<f64>,
    pub max_occupancy_rate: Option<f64>,
    pub empty_percentage: f64,
    pub full_percentage: f64,
    pub capacity: Option<i64>,
    pub coordinates: [f64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<IssueType>,
}

/// Fleet-wide totals and averages, one record per run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStatistics {
    pub total_stations: u64,
    pub total_bikes: i64,
    pub total_docks: i64,
    pub avg_bikes_per_station: f64,
    pub avg_docks_per_station: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(code: Option<&str>, bikes: Option<i64>) -> RawSnapshot {
        RawSnapshot {
            station_code: code.map(str::to_string),
            name: Some("Test".to_string()),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            num_bikes_available: bikes,
            num_docks_available: Some(5),
            capacity: Some(20),
            longitude: 2.27,
            latitude: 48.86,
            is_installed: true,
        }
    }

    #[test]
    fn test_clean_keeps_valid_snapshot() {
        let s = raw(Some("101"), Some(10)).clean().unwrap();
        assert_eq!(s.station_code, "101");
        assert_eq!(s.num_bikes_available, 10);
        assert_eq!(s.date(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(s.hour(), 8);
    }

    #[test]
    fn test_clean_drops_missing_station_code() {
        assert!(raw(None, Some(10)).clean().is_none());
        assert!(raw(Some(""), Some(10)).clean().is_none());
        assert!(raw(Some("   "), Some(10)).clean().is_none());
    }

    #[test]
    fn test_clean_drops_missing_bike_count() {
        assert!(raw(Some("101"), None).clean().is_none());
    }

    #[test]
    fn test_incident_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&IncidentType::CapacityAnomaly).unwrap();
        assert_eq!(json, "\"CAPACITY_ANOMALY\"");
        let json = serde_json::to_string(&IssueType::FrequentlyEmpty).unwrap();
        assert_eq!(json, "\"FREQUENTLY_EMPTY\"");
    }

    #[test]
    fn test_raw_snapshot_camel_case_round_trip() {
        let payload = r#"{
            "stationCode": "16107",
            "name": "BENJAMIN GODARD - VICTOR HUGO",
            "timestamp": "2024-01-15T14:29:45",
            "numBikesAvailable": 12,
            "numDocksAvailable": 23,
            "capacity": 35,
            "longitude": 2.275725,
            "latitude": 48.865983,
            "isInstalled": true
        }"#;

        let snap: RawSnapshot = serde_json::from_str(payload).unwrap();
        assert_eq!(snap.station_code.as_deref(), Some("16107"));
        assert_eq!(snap.capacity, Some(35));

        let back = serde_json::to_value(&snap).unwrap();
        assert_eq!(back["numBikesAvailable"], 12);
        assert_eq!(back["isInstalled"], true);
    }
}
