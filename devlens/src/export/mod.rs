//! Output for traces and reports
//!
//! - `sink`: human-readable event lines and profiler tables
//! - `chrome_trace`: Chrome Trace Event Format JSON for chrome://tracing or Perfetto

pub mod chrome_trace;
pub mod sink;

pub use chrome_trace::ChromeTraceExporter;
pub use sink::{format_event, format_report, ReportSink};
