//! Snapshot loading from the date-partitioned CSV archive.

use crate::model::RawSnapshot;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Supplies the raw snapshot collection for a run, optionally scoped to a
/// single date partition. When no date is given the full retention window
/// is read.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, date: Option<NaiveDate>) -> Result<Vec<RawSnapshot>>;
}

/// Reads `date=YYYY-MM-DD.csv` partitions from a local archive directory,
/// as written by the ingest collaborator.
pub struct CsvDirLoader {
    input_dir: PathBuf,
}

impl CsvDirLoader {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }

    fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.input_dir
            .join(format!("date={}.csv", date.format("%Y-%m-%d")))
    }

    fn partition_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        for entry in std::fs::read_dir(&self.input_dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_str().unwrap_or("");
            if name.starts_with("date=") && path.extension().and_then(|e| e.to_str()) == Some("csv")
            {
                paths.push(path);
            }
        }

        // Deterministic read order across runs.
        paths.sort();
        Ok(paths)
    }
}

/// Deserializes snapshot rows from one partition file. A row that fails to
/// deserialize is skipped; it never aborts the load.
fn read_partition(path: &Path) -> Result<Vec<RawSnapshot>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut rows = Vec::new();

    for result in rdr.deserialize() {
        match result {
            Ok(record) => rows.push(record),
            Err(e) => debug!(path = %path.display(), error = %e, "Skipping malformed CSV row"),
        }
    }

    Ok(rows)
}

#[async_trait]
impl Loader for CsvDirLoader {
    async fn load(&self, date: Option<NaiveDate>) -> Result<Vec<RawSnapshot>> {
        let paths = match date {
            Some(date) => {
                let path = self.partition_path(date);
                if !path.exists() {
                    debug!(path = %path.display(), "Date partition does not exist");
                    return Ok(Vec::new());
                }
                vec![path]
            }
            None => self.partition_paths()?,
        };

        let mut snapshots = Vec::new();
        for path in &paths {
            let rows = read_partition(path)?;
            debug!(path = %path.display(), rows = rows.len(), "Partition loaded");
            snapshots.extend(rows);
        }

        Ok(snapshots)
    }
}
