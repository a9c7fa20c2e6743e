//! Analysis logic for profiling data
//!
//! This module contains pure aggregation logic for profiling runs,
//! separated from collection (`profiling`) and presentation (`export`).

pub mod report;
pub mod snapshot;

pub use report::{FunctionStats, Report, StatsAggregator};
pub use snapshot::{DEFAULT_SNAPSHOT_FILE, SNAPSHOT_VERSION};
