//! The aggregation and detection engine.
//!
//! Every stage is a pure function over an immutable snapshot collection:
//! cleaning gates the raw archive, six derived stages each read the shared
//! cleaned (or raw) set independently, and the driver in [`run`] wires them
//! to a [`crate::loader::Loader`] and a [`crate::sink::Sink`].

pub mod anomaly;
pub mod clean;
pub mod daily;
pub mod global_stats;
pub mod hourly;
pub mod incident;
pub mod occupancy;
pub mod run;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;
