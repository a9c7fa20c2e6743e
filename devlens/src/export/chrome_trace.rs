// Timestamps are converted to fractional microseconds for the trace format
#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::io::Write;

use crate::domain::{EventKind, TraceError};
use crate::trace::TraceEvent;

/// Chrome Trace Event format
/// Spec: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/preview
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChromeTraceEvent {
    /// Event name (function name)
    name: String,
    /// Category for filtering/coloring (module path)
    cat: String,
    /// Phase: "B" = begin, "E" = end, "i" = instant
    ph: String,
    /// Timestamp in microseconds since session start
    ts: f64,
    pid: u32,
    tid: u32,
    /// Instant event scope: "t" = thread
    #[serde(skip_serializing_if = "Option::is_none")]
    s: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<HashMap<String, JsonValue>>,
}

/// Chrome Trace Format container
#[derive(Debug, Serialize)]
struct ChromeTrace<'a> {
    #[serde(rename = "traceEvents")]
    trace_events: &'a [ChromeTraceEvent],
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: &'static str,
}

/// Chrome trace exporter for timeline visualization of a trace log
pub struct ChromeTraceExporter {
    events: Vec<ChromeTraceEvent>,
    pid: u32,
    tid: u32,
}

impl ChromeTraceExporter {
    /// Exporter labelling every event with the given process and thread IDs
    #[must_use]
    pub fn new(pid: u32, tid: u32) -> Self {
        Self { events: Vec::new(), pid, tid }
    }

    /// Add a trace event to the timeline
    pub fn add_event(&mut self, event: &TraceEvent) {
        let ts = event.offset.as_nanos() as f64 / 1000.0;
        let mut args: HashMap<String, JsonValue> = HashMap::new();

        let (ph, scope) = match event.kind {
            EventKind::Call => {
                for arg in event.arguments.iter().flatten() {
                    args.insert(arg.name.clone(), JsonValue::String(arg.value.clone()));
                }
                ("B", None)
            }
            EventKind::Return => {
                if let Some(duration) = event.duration {
                    args.insert("duration_us".to_string(), JsonValue::from(duration.as_micros() as f64));
                }
                ("E", None)
            }
            EventKind::Exception => {
                if let Some(ref error) = event.error {
                    args.insert("error".to_string(), JsonValue::String(error.clone()));
                }
                ("i", Some("t".to_string()))
            }
        };

        self.events.push(ChromeTraceEvent {
            name: event.function.name.clone(),
            cat: event.function.module.clone(),
            ph: ph.to_string(),
            ts,
            pid: self.pid,
            tid: self.tid,
            s: scope,
            args: if args.is_empty() { None } else { Some(args) },
        });
    }

    /// Add every event of a trace log in order
    pub fn add_events(&mut self, events: &[TraceEvent]) {
        for event in events {
            self.add_event(event);
        }
    }

    /// Number of timeline entries collected
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Export trace to JSON file
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn export<W: Write>(&self, mut writer: W) -> Result<(), TraceError> {
        let trace = ChromeTrace { trace_events: &self.events, display_time_unit: "ms" };
        serde_json::to_writer_pretty(&mut writer, &trace)?;
        writer.flush()?;
        Ok(())
    }
}

impl Default for ChromeTraceExporter {
    fn default() -> Self {
        Self::new(std::process::id(), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Argument, FunctionId};
    use std::time::{Duration, Instant};

    fn event(kind: EventKind, offset_us: u64) -> TraceEvent {
        TraceEvent {
            function: FunctionId::new("h", "app"),
            kind,
            timestamp: Instant::now(),
            offset: Duration::from_micros(offset_us),
            arguments: (kind == EventKind::Call).then(|| vec![Argument::new("arg", "5")]),
            duration: (kind == EventKind::Return).then(|| Duration::from_micros(offset_us)),
            error: (kind == EventKind::Exception).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_export_pairs_begin_and_end() {
        let mut exporter = ChromeTraceExporter::new(42, 7);
        exporter.add_events(&[
            event(EventKind::Call, 0),
            event(EventKind::Exception, 5),
            event(EventKind::Return, 10),
        ]);

        let mut buffer = Vec::new();
        exporter.export(&mut buffer).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buffer).unwrap();

        let events = parsed["traceEvents"].as_array().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["ph"], "B");
        assert_eq!(events[0]["args"]["arg"], "5");
        assert_eq!(events[0]["cat"], "app");
        assert_eq!(events[1]["ph"], "i");
        assert_eq!(events[1]["args"]["error"], "boom");
        assert_eq!(events[2]["ph"], "E");
        assert_eq!(events[2]["ts"], 10.0);
        assert_eq!(events[2]["pid"], 42);
        assert_eq!(parsed["displayTimeUnit"], "ms");
    }
}
