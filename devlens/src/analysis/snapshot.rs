//! Profiling snapshots
//!
//! A snapshot stores the raw per-call samples of a report (not the
//! aggregated rows), so any report can be regenerated from it later with a
//! different sort order.

use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use super::report::Report;
use crate::domain::TraceError;
use crate::profiling::collector::as_nanos;
use crate::profiling::CallSample;

/// File written when no other name is given
pub const DEFAULT_SNAPSHOT_FILE: &str = "profiling_results.prof";

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    total_ns: u64,
    samples: &'a [CallSample],
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    total_ns: u64,
    samples: Vec<CallSample>,
}

impl Report {
    /// Persist the raw samples of this report to `path`.
    ///
    /// # Errors
    /// Returns [`TraceError::PersistenceFailure`] if the file cannot be
    /// created or written.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), TraceError> {
        let path = path.as_ref();
        let failure = |source: std::io::Error| TraceError::PersistenceFailure {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(failure)?;
        let mut writer = BufWriter::new(file);
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            total_ns: as_nanos(self.total_time()),
            samples: self.samples(),
        };
        serde_json::to_writer(&mut writer, &snapshot).map_err(|e| failure(e.into()))?;
        writer.flush().map_err(failure)?;

        info!("saved {} profiling samples to {}", self.samples().len(), path.display());
        Ok(())
    }

    /// Regenerate a report from a snapshot written by [`Report::save_to`].
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read,
    /// [`TraceError::SnapshotFormat`] if it is not a snapshot, and
    /// [`TraceError::UnsupportedSnapshotVersion`] for unknown versions.
    pub fn load(path: impl AsRef<Path>) -> Result<Report, TraceError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Snapshot = serde_json::from_reader(reader)
            .map_err(|source| TraceError::SnapshotFormat { path: path.to_path_buf(), source })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TraceError::UnsupportedSnapshotVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        Ok(Report::from_samples(snapshot.samples, Duration::from_nanos(snapshot.total_ns)))
    }
}
