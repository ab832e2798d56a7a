//! Persistence of derived collections.
//!
//! Every write is a full replace: whatever the target collection held
//! before the run is discarded. Partial success across collections is
//! accepted; the driver decides what to do with a failed write.

use anyhow::Result;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Collection names, matching the document-store layout the dashboards read.
pub const DAILY_AGGREGATES: &str = "stations_aggregated";
pub const HOURLY_PATTERNS: &str = "hourly_patterns";
pub const ANOMALIES: &str = "station_anomalies";
pub const INCIDENTS: &str = "station_incidents";
pub const OCCUPANCY_TRACKING: &str = "stations_empty_full_tracking";
pub const PROBLEMATIC_STATIONS: &str = "problematic_stations";
pub const GLOBAL_STATS: &str = "daily_stats";

/// A full-replace write target for the derived collections.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn replace(&self, collection: &str, docs: &[Value]) -> Result<()>;
}

/// Converts derived records into flat JSON documents.
///
/// This is the single serialization boundary between the engine and any
/// sink. Non-finite floats come out as JSON null here, so a NaN can never
/// reach a sink as a number.
pub fn to_documents<T: Serialize>(records: &[T]) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|r| Ok(serde_json::to_value(r)?))
        .collect()
}

/// Writes each collection as `<out_dir>/<collection>.json`, overwriting any
/// previous run's file.
pub struct JsonFileSink {
    out_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

#[async_trait]
impl Sink for JsonFileSink {
    async fn replace(&self, collection: &str, docs: &[Value]) -> Result<()> {
        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(format!("{}.json", collection));

        let body = serde_json::to_vec_pretty(docs)?;
        std::fs::write(&path, body)?;

        debug!(path = %path.display(), docs = docs.len(), "Collection written");
        Ok(())
    }
}

/// Uploads each collection as `<prefix>/<collection>.json` to an S3 bucket,
/// optionally gzip-compressed.
pub struct S3Sink {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    gzip: bool,
}

impl S3Sink {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, prefix: String, gzip: bool) -> Self {
        Self {
            client,
            bucket,
            prefix,
            gzip,
        }
    }
}

#[async_trait]
impl Sink for S3Sink {
    async fn replace(&self, collection: &str, docs: &[Value]) -> Result<()> {
        let body = serde_json::to_vec(docs)?;

        let (body, key) = if self.gzip {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&body)?;
            let compressed = encoder.finish()?;
            (compressed, format!("{}/{}.json.gz", self.prefix, collection))
        } else {
            (body, format!("{}/{}.json", self.prefix, collection))
        };

        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body.into())
            .content_type("application/json");
        if self.gzip {
            req = req.content_encoding("gzip");
        }
        req.send().await?;

        debug!(key, docs = docs.len(), "Collection uploaded");
        Ok(())
    }
}
