//! Snapshot cleaning: the only gate between the raw archive and the
//! aggregation stages.

use crate::model::{RawSnapshot, Snapshot};
use tracing::debug;

/// Filters out snapshots missing a station code or a bike count.
///
/// No numeric-range or coordinate validation happens here; a snapshot that
/// passes cleaning is merely keyable and countable.
pub fn clean_snapshots(raw: &[RawSnapshot]) -> Vec<Snapshot> {
    let cleaned: Vec<Snapshot> = raw.iter().filter_map(RawSnapshot::clean).collect();

    let dropped = raw.len() - cleaned.len();
    if dropped > 0 {
        debug!(dropped, kept = cleaned.len(), "Dropped malformed snapshots");
    }

    cleaned
}
