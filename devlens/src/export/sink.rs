//! Text output for trace events and profiling reports
//!
//! Event lines read `<seconds since session start> - <message>`. Reports use
//! the familiar profiler table:
//!
//! ```text
//!          7 function calls (5 primitive calls) in 0.001 seconds
//!
//!    Ordered by: cumulative time
//!
//!    ncalls  tottime  percall  cumtime  percall function
//!       3/1    0.000    0.000    0.001    0.001 app::fib
//! ```

// Durations are rendered as fractional seconds for display
#![allow(clippy::cast_precision_loss)]

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::analysis::{FunctionStats, Report};
use crate::domain::SortKey;
use crate::trace::TraceEvent;

/// Destination for human-readable output
pub struct ReportSink {
    writer: Box<dyn Write>,
}

impl ReportSink {
    /// Standard diagnostic output
    #[must_use]
    pub fn stderr() -> Self {
        Self::to_writer(io::stderr())
    }

    #[must_use]
    pub fn stdout() -> Self {
        Self::to_writer(io::stdout())
    }

    pub fn to_writer(writer: impl Write + 'static) -> Self {
        Self { writer: Box::new(writer) }
    }

    /// Write one event as a single line
    ///
    /// # Errors
    /// Returns an error if the destination cannot be written.
    pub fn write_event(&mut self, event: &TraceEvent) -> io::Result<()> {
        writeln!(self.writer, "{}", format_event(event))
    }

    /// Write events in order, one line each
    ///
    /// # Errors
    /// Returns an error if the destination cannot be written.
    pub fn write_events(&mut self, events: &[TraceEvent]) -> io::Result<()> {
        for event in events {
            self.write_event(event)?;
        }
        self.writer.flush()
    }

    /// Write `report` sorted by `key`, limited to `limit` rows if given
    ///
    /// # Errors
    /// Returns an error if the destination cannot be written.
    pub fn write_report(
        &mut self,
        report: &Report,
        key: SortKey,
        limit: Option<usize>,
    ) -> io::Result<()> {
        self.writer.write_all(format_report(report, key, limit).as_bytes())?;
        self.writer.flush()
    }

    /// # Errors
    /// Returns an error if the destination cannot be flushed.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Default for ReportSink {
    fn default() -> Self {
        Self::stderr()
    }
}

/// Render one event as `<offset> - <message>`
#[must_use]
pub fn format_event(event: &TraceEvent) -> String {
    let mut line = format!("{:>12.6} - {}", event.offset.as_secs_f64(), event.message());
    if let Some(duration) = event.duration {
        let _ = write!(line, " after {duration:?}");
    }
    line
}

/// Render a report as a profiler table
#[must_use]
pub fn format_report(report: &Report, key: SortKey, limit: Option<usize>) -> String {
    let mut out = String::new();
    let total = report.total_calls();
    let primitive = report.primitive_calls();

    if total == primitive {
        let _ = write!(out, "{total:>10} function calls");
    } else {
        let _ = write!(out, "{total:>10} function calls ({primitive} primitive calls)");
    }
    let _ = writeln!(out, " in {:.3} seconds\n", report.total_time().as_secs_f64());
    let _ = writeln!(out, "   Ordered by: {}\n", key.label());
    let _ = writeln!(out, "   ncalls  tottime  percall  cumtime  percall function");

    let rows = report.sorted_by(key);
    let shown = limit.unwrap_or(rows.len());
    for stats in rows.iter().take(shown) {
        let _ = writeln!(out, "{}", format_row(stats));
    }
    if shown < rows.len() {
        let _ = writeln!(out, "   ... {} more functions", rows.len() - shown);
    }
    out.push('\n');
    out
}

fn format_row(stats: &FunctionStats) -> String {
    let calls = if stats.call_count == stats.primitive_calls {
        stats.call_count.to_string()
    } else {
        format!("{}/{}", stats.call_count, stats.primitive_calls)
    };
    format!(
        "{calls:>9} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {}",
        stats.own_time.as_secs_f64(),
        stats.own_per_call().as_secs_f64(),
        stats.cumulative_time.as_secs_f64(),
        stats.cumulative_per_call().as_secs_f64(),
        stats.function
    )
}
