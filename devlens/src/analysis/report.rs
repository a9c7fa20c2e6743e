//! Per-function statistics for profiling runs.
//!
//! This module aggregates raw call samples by function identity into call
//! counts, cumulative time and own time, and exposes them as a sortable
//! [`Report`].
//!
//! # Architecture
//!
//! - **`StatsAggregator`** - Folds samples into `FunctionStats` one at a time
//! - **`Report`** - Read-only view: raw samples plus aggregated statistics
//!
//! ## Accounting
//!
//! ```text
//! own time        += elapsed - time of direct instrumented children
//! cumulative time += elapsed            (outermost activation only)
//! primitive calls += 1                  (not already on the call path)
//! ```
//!
//! A recursive activation still counts as a call and still contributes its
//! own time, but its elapsed time is already inside the outermost activation
//! of the same function, so it is not added to cumulative time again.
//!
//! # Performance
//!
//! - `record_sample()`: O(1) amortized (HashMap insert/update)
//! - `sorted_by()`: O(n log n) where n = unique functions

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::{FunctionId, SortKey};
use crate::profiling::CallSample;

// =============================================================================
// FUNCTION STATS (OUTPUT TYPE)
// =============================================================================

/// Aggregated statistics for one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionStats {
    pub function: FunctionId,

    /// Every completed invocation, recursive ones included.
    pub call_count: u64,

    /// Invocations that were not part of a recursion cycle.
    pub primitive_calls: u64,

    /// Elapsed time including all descendants, counted once per outermost
    /// activation.
    pub cumulative_time: Duration,

    /// Elapsed time excluding nested instrumented calls.
    pub own_time: Duration,
}

impl FunctionStats {
    fn new(function: FunctionId) -> Self {
        Self {
            function,
            call_count: 0,
            primitive_calls: 0,
            cumulative_time: Duration::ZERO,
            own_time: Duration::ZERO,
        }
    }

    /// Own time per call
    #[must_use]
    pub fn own_per_call(&self) -> Duration {
        per_call(self.own_time, self.call_count)
    }

    /// Cumulative time per primitive call
    #[must_use]
    pub fn cumulative_per_call(&self) -> Duration {
        per_call(self.cumulative_time, self.primitive_calls)
    }
}

fn per_call(total: Duration, calls: u64) -> Duration {
    if calls == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(u64::try_from(total.as_nanos() / u128::from(calls)).unwrap_or(u64::MAX))
}

// =============================================================================
// STATS AGGREGATOR
// =============================================================================

/// Incremental per-function aggregator.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    functions: HashMap<FunctionId, FunctionStats>,
    total_calls: u64,
}

impl StatsAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one completed invocation into the statistics.
    pub fn record_sample(&mut self, sample: &CallSample) {
        self.total_calls += 1;

        let stats = self
            .functions
            .entry(sample.function.clone())
            .or_insert_with(|| FunctionStats::new(sample.function.clone()));

        stats.call_count += 1;
        stats.own_time += Duration::from_nanos(sample.own_ns());
        if !sample.recursive {
            stats.primitive_calls += 1;
            stats.cumulative_time += Duration::from_nanos(sample.elapsed_ns);
        }
    }

    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    /// Finished statistics ordered by function identity
    #[must_use]
    pub fn into_stats(self) -> Vec<FunctionStats> {
        let mut stats: Vec<FunctionStats> = self.functions.into_values().collect();
        stats.sort_unstable_by(|a, b| a.function.cmp(&b.function));
        stats
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Sorted, read-only view over one profiling run.
#[derive(Debug, Clone)]
pub struct Report {
    samples: Vec<CallSample>,
    stats: Vec<FunctionStats>,
    total_time: Duration,
}

impl Report {
    /// Aggregate raw samples into a report
    #[must_use]
    pub fn from_samples(samples: Vec<CallSample>, total_time: Duration) -> Self {
        let mut aggregator = StatsAggregator::new();
        for sample in &samples {
            aggregator.record_sample(sample);
        }
        Self { samples, stats: aggregator.into_stats(), total_time }
    }

    /// Raw per-call samples, in completion order
    #[must_use]
    pub fn samples(&self) -> &[CallSample] {
        &self.samples
    }

    /// Statistics ordered by function identity
    #[must_use]
    pub fn stats(&self) -> &[FunctionStats] {
        &self.stats
    }

    /// Wall time of the profiled run or region
    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.stats.iter().map(|s| s.call_count).sum()
    }

    #[must_use]
    pub fn primitive_calls(&self) -> u64 {
        self.stats.iter().map(|s| s.primitive_calls).sum()
    }

    /// Statistics for the first function with this local name
    #[must_use]
    pub fn stats_for(&self, name: &str) -> Option<&FunctionStats> {
        self.stats.iter().find(|s| s.function.name == name)
    }

    /// Rows ordered by `key`; ties broken by function name ascending.
    #[must_use]
    pub fn sorted_by(&self, key: SortKey) -> Vec<&FunctionStats> {
        let mut rows: Vec<&FunctionStats> = self.stats.iter().collect();
        rows.sort_by(|a, b| compare(key, a, b).then_with(|| a.function.cmp(&b.function)));
        rows
    }

    /// Direct callers of `name` with the number of calls each made,
    /// most frequent first
    #[must_use]
    pub fn callers_of(&self, name: &str) -> Vec<(Option<FunctionId>, u64)> {
        let mut counts: HashMap<Option<&FunctionId>, u64> = HashMap::new();
        for sample in self.samples.iter().filter(|s| s.function.name == name) {
            *counts.entry(sample.caller.as_ref()).or_insert(0) += 1;
        }
        let mut callers: Vec<(Option<FunctionId>, u64)> =
            counts.into_iter().map(|(caller, count)| (caller.cloned(), count)).collect();
        callers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        callers
    }
}

fn compare(key: SortKey, a: &FunctionStats, b: &FunctionStats) -> Ordering {
    match key {
        SortKey::Calls => b.call_count.cmp(&a.call_count),
        SortKey::Cumulative => b.cumulative_time.cmp(&a.cumulative_time),
        SortKey::Time => b.own_time.cmp(&a.own_time),
        SortKey::Name => Ordering::Equal,
    }
}
