//! Profiling wrapper for a single callable
//!
//! [`profile_code`] turns a function into a [`ProfiledFn`]: every call runs
//! under its own profiler region, prints the sorted report to a sink, and
//! optionally saves the raw samples.

use std::path::PathBuf;

use super::profiler::Profiler;
use crate::analysis::{Report, DEFAULT_SNAPSHOT_FILE};
use crate::domain::{CallSite, SortKey, TraceError};
use crate::export::ReportSink;
use crate::hook;

/// Options for [`profile_code`]
#[derive(Debug, Clone)]
pub struct ProfileOptions {
    pub sort_by: SortKey,
    /// Save raw samples after every call
    pub save_to_file: bool,
    pub filename: PathBuf,
    /// Print at most this many report rows
    pub limit: Option<usize>,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            sort_by: SortKey::Cumulative,
            save_to_file: false,
            filename: PathBuf::from(DEFAULT_SNAPSHOT_FILE),
            limit: None,
        }
    }
}

/// Instrumented callable produced by [`profile_code`]
pub struct ProfiledFn<F> {
    site: CallSite,
    options: ProfileOptions,
    sink: ReportSink,
    f: F,
    last_report: Option<Report>,
}

/// Wrap `f` so each call is profiled and reported.
///
/// The call itself appears in the report under `site`. Reports go to
/// standard output unless [`ProfiledFn::with_sink`] says otherwise.
pub fn profile_code<F>(site: CallSite, options: ProfileOptions, f: F) -> ProfiledFn<F> {
    ProfiledFn { site, options, sink: ReportSink::stdout(), f, last_report: None }
}

impl<F> ProfiledFn<F> {
    #[must_use]
    pub fn with_sink(mut self, sink: ReportSink) -> Self {
        self.sink = sink;
        self
    }

    /// Report of the most recent call
    #[must_use]
    pub fn last_report(&self) -> Option<&Report> {
        self.last_report.as_ref()
    }

    /// Call the wrapped function under the profiler.
    ///
    /// # Errors
    /// Returns an error if the report cannot be written to the sink, or
    /// [`TraceError::PersistenceFailure`] if saving the snapshot fails. The
    /// wrapped function has run to completion in both cases.
    pub fn call<A, R>(&mut self, args: A) -> Result<R, TraceError>
    where
        F: FnMut(A) -> R,
    {
        let site = self.site;
        let f = &mut self.f;
        let (result, report) = Profiler::run(|| hook::call(site, Vec::new(), || f(args)));

        self.sink.write_report(&report, self.options.sort_by, self.options.limit)?;
        if self.options.save_to_file {
            report.save_to(&self.options.filename)?;
        }
        self.last_report = Some(report);
        Ok(result)
    }
}
