//! Station API payload handling and CSV archiving.
//!
//! The ingest collaborator polls the station-status API, flattens each
//! station record into a [`RawSnapshot`] stamped with the poll time, and
//! appends the rows to a date-partitioned CSV archive that the batch
//! loader reads back.

use crate::model::RawSnapshot;
use anyhow::{Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One station as returned by the status API (vls v3 shape). Fields the
/// pipeline ignores are simply not listed; serde drops them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStation {
    pub number: i64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub position: Option<ApiPosition>,
    pub total_stands: Option<ApiStands>,
}

#[derive(Debug, Deserialize)]
pub struct ApiPosition {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStands {
    pub availabilities: Option<ApiAvailabilities>,
    pub capacity: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAvailabilities {
    pub bikes: Option<i64>,
    pub stands: Option<i64>,
}

/// Parses the API response body, which must be a JSON array of stations.
pub fn parse_stations(bytes: &[u8]) -> Result<Vec<ApiStation>> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    if !value.is_array() {
        bail!("unexpected station API response shape, expected a JSON array");
    }
    Ok(serde_json::from_value(value)?)
}

/// Flattens an API station into the archive snapshot schema, stamped with
/// the poll time. A station is considered installed while its status is
/// `OPEN`.
pub fn to_snapshot(station: &ApiStation, polled_at: NaiveDateTime) -> RawSnapshot {
    let (bikes, stands, capacity) = match &station.total_stands {
        Some(stands) => (
            stands.availabilities.as_ref().and_then(|a| a.bikes),
            stands.availabilities.as_ref().and_then(|a| a.stands),
            stands.capacity,
        ),
        None => (None, None, None),
    };

    let (longitude, latitude) = station
        .position
        .as_ref()
        .map_or((0.0, 0.0), |p| (p.longitude, p.latitude));

    RawSnapshot {
        station_code: Some(station.number.to_string()),
        name: station.name.clone(),
        timestamp: polled_at,
        num_bikes_available: bikes,
        num_docks_available: stands,
        capacity,
        longitude,
        latitude,
        is_installed: station.status.as_deref() == Some("OPEN"),
    }
}

/// The archive partition file for a given date.
pub fn partition_path(output_dir: &str, date: NaiveDate) -> PathBuf {
    Path::new(output_dir).join(format!("date={}.csv", date.format("%Y-%m-%d")))
}

/// Appends snapshot rows to a partition CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_snapshots(path: &Path, snapshots: &[RawSnapshot]) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = snapshots.len(), "Appending CSV rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for snapshot in snapshots {
        writer.serialize(snapshot)?;
    }
    writer.flush()?;

    Ok(())
}

/// S3 object key for one day's archived partition.
pub fn partition_key(prefix: &str, date: NaiveDate, gzip: bool) -> String {
    let name = format!("date={}.csv", date.format("%Y-%m-%d"));
    if gzip {
        format!("{}/{}.gz", prefix, name)
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Reads a partition file into an upload body, gzip-compressing it when
/// asked.
pub fn upload_body(path: &Path, gzip: bool) -> Result<Vec<u8>> {
    let contents = std::fs::read(path)?;
    if !gzip {
        return Ok(contents);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&contents)?;
    Ok(encoder.finish()?)
}
