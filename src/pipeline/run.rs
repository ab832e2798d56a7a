//! Batch run driver: load, clean, derive, persist.

use crate::loader::Loader;
use crate::model::Snapshot;
use crate::pipeline::anomaly::detect_anomalies;
use crate::pipeline::clean::clean_snapshots;
use crate::pipeline::daily::aggregate_daily;
use crate::pipeline::global_stats::compute_global_stats;
use crate::pipeline::hourly::analyze_hourly;
use crate::pipeline::incident::detect_incidents;
use crate::pipeline::occupancy::{problematic_stations, track_occupancy};
use crate::sink::{
    ANOMALIES, DAILY_AGGREGATES, GLOBAL_STATS, HOURLY_PATTERNS, INCIDENTS, OCCUPANCY_TRACKING,
    PROBLEMATIC_STATIONS, Sink, to_documents,
};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs the full batch pipeline once.
///
/// A loader failure or an empty load aborts the run early with a warning
/// and writes nothing. The six derived stages share no state beyond the
/// cleaned (or raw) input, so they run on parallel blocking tasks. Each
/// collection write failure is logged and the remaining collections are
/// still attempted; there is no transaction across the seven outputs.
#[tracing::instrument(skip(loader, sink), fields(date = ?date))]
pub async fn run_pipeline(
    loader: &dyn Loader,
    sink: &dyn Sink,
    date: Option<NaiveDate>,
) -> Result<()> {
    let raw = match loader.load(date).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Loader failed, aborting run");
            return Ok(());
        }
    };

    if raw.is_empty() {
        warn!("No snapshots to process, aborting run");
        return Ok(());
    }

    info!(snapshots = raw.len(), "Snapshots loaded");

    let cleaned: Arc<Vec<Snapshot>> = Arc::new(clean_snapshots(&raw));
    let raw = Arc::new(raw);
    info!(cleaned = cleaned.len(), "Snapshots cleaned");

    let daily = {
        let snaps = Arc::clone(&cleaned);
        tokio::task::spawn_blocking(move || aggregate_daily(&snaps))
    };
    let hourly = {
        let snaps = Arc::clone(&cleaned);
        tokio::task::spawn_blocking(move || analyze_hourly(&snaps))
    };
    let anomalies = {
        let snaps = Arc::clone(&cleaned);
        tokio::task::spawn_blocking(move || detect_anomalies(&snaps))
    };
    let incidents = {
        let raw = Arc::clone(&raw);
        tokio::task::spawn_blocking(move || detect_incidents(&raw))
    };
    let occupancy = {
        let snaps = Arc::clone(&cleaned);
        tokio::task::spawn_blocking(move || track_occupancy(&snaps))
    };
    let global = {
        let snaps = Arc::clone(&cleaned);
        tokio::task::spawn_blocking(move || compute_global_stats(&snaps))
    };

    let daily = daily.await?;
    let hourly = hourly.await?;
    let anomalies = anomalies.await?;
    let incidents = incidents.await?;
    let occupancy = occupancy.await?;
    let global = global.await?;
    let problematic = problematic_stations(&occupancy);

    info!(
        daily = daily.len(),
        hourly = hourly.len(),
        anomalies = anomalies.len(),
        incidents = incidents.len(),
        occupancy = occupancy.len(),
        problematic = problematic.len(),
        "Derived collections computed"
    );

    let mut failed = 0usize;
    failed += usize::from(!write_collection(sink, DAILY_AGGREGATES, &daily).await);
    failed += usize::from(!write_collection(sink, HOURLY_PATTERNS, &hourly).await);
    failed += usize::from(!write_collection(sink, ANOMALIES, &anomalies).await);
    failed += usize::from(!write_collection(sink, INCIDENTS, &incidents).await);
    failed += usize::from(!write_collection(sink, OCCUPANCY_TRACKING, &occupancy).await);
    failed += usize::from(!write_collection(sink, PROBLEMATIC_STATIONS, &problematic).await);
    failed +=
        usize::from(!write_collection(sink, GLOBAL_STATS, std::slice::from_ref(&global)).await);

    if failed > 0 {
        warn!(failed, "Run finished with failed collection writes");
    } else {
        info!("Run finished, all collections written");
    }

    Ok(())
}

/// Serializes and writes one collection; returns whether the write
/// succeeded. Failures are logged here, not raised.
async fn write_collection<T: Serialize>(sink: &dyn Sink, collection: &str, records: &[T]) -> bool {
    let docs = match to_documents(records) {
        Ok(docs) => docs,
        Err(e) => {
            error!(collection, error = %e, "Failed to serialize collection");
            return false;
        }
    };

    match sink.replace(collection, &docs).await {
        Ok(()) => {
            info!(collection, records = docs.len(), "Collection replaced");
            true
        }
        Err(e) => {
            error!(collection, error = %e, "Failed to write collection");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawSnapshot;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticLoader(Vec<RawSnapshot>);

    #[async_trait]
    impl Loader for StaticLoader {
        async fn load(&self, _date: Option<NaiveDate>) -> Result<Vec<RawSnapshot>> {
            Ok(self.0.clone())
        }
    }

    struct FailingLoader;

    #[async_trait]
    impl Loader for FailingLoader {
        async fn load(&self, _date: Option<NaiveDate>) -> Result<Vec<RawSnapshot>> {
            Err(anyhow!("archive unreachable"))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        collections: Mutex<HashMap<String, Vec<Value>>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl Sink for MemorySink {
        async fn replace(&self, collection: &str, docs: &[Value]) -> Result<()> {
            if self.fail_on == Some(collection) {
                return Err(anyhow!("write refused"));
            }
            self.collections
                .lock()
                .unwrap()
                .insert(collection.to_string(), docs.to_vec());
            Ok(())
        }
    }

    fn snapshot(code: &str, ts: &str, bikes: i64) -> RawSnapshot {
        RawSnapshot {
            station_code: Some(code.to_string()),
            name: Some(format!("Station {}", code)),
            timestamp: ts.parse().unwrap(),
            num_bikes_available: Some(bikes),
            num_docks_available: Some(20 - bikes),
            capacity: Some(20),
            longitude: 2.35,
            latitude: 48.85,
            is_installed: true,
        }
    }

    #[tokio::test]
    async fn test_loader_failure_aborts_without_writes() {
        let sink = MemorySink::default();

        run_pipeline(&FailingLoader, &sink, None).await.unwrap();

        assert!(sink.collections.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_load_aborts_without_writes() {
        let sink = MemorySink::default();

        run_pipeline(&StaticLoader(vec![]), &sink, None)
            .await
            .unwrap();

        assert!(sink.collections.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_seven_collections_written() {
        let loader = StaticLoader(vec![
            snapshot("101", "2024-01-15T08:00:00", 5),
            snapshot("101", "2024-01-15T09:00:00", 7),
        ]);
        let sink = MemorySink::default();

        run_pipeline(&loader, &sink, None).await.unwrap();

        let collections = sink.collections.lock().unwrap();
        for name in [
            DAILY_AGGREGATES,
            HOURLY_PATTERNS,
            ANOMALIES,
            INCIDENTS,
            OCCUPANCY_TRACKING,
            PROBLEMATIC_STATIONS,
            GLOBAL_STATS,
        ] {
            assert!(collections.contains_key(name), "missing {}", name);
        }
        assert_eq!(collections[GLOBAL_STATS].len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_remaining_collections() {
        let loader = StaticLoader(vec![
            snapshot("101", "2024-01-15T08:00:00", 5),
            snapshot("101", "2024-01-15T09:00:00", 7),
        ]);
        let sink = MemorySink {
            fail_on: Some(DAILY_AGGREGATES),
            ..Default::default()
        };

        run_pipeline(&loader, &sink, None).await.unwrap();

        let collections = sink.collections.lock().unwrap();
        assert!(!collections.contains_key(DAILY_AGGREGATES));
        assert!(collections.contains_key(GLOBAL_STATS));
        assert!(collections.contains_key(INCIDENTS));
    }
}
