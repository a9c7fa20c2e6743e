//! Call stack tracker
//!
//! Correlates `Call`/`Return`/`Exception` events into frames, computes the
//! duration of every invocation and appends the resulting [`TraceEvent`]s to
//! the session's log.
//!
//! The stack is strictly LIFO. A `Return` whose function is not on top is a
//! desynchronization: the tracker searches downward for the nearest matching
//! frame, discards everything above it, and keeps going. Desyncs are logged
//! and counted, never propagated to the traced program.

use log::{info, warn};
use std::collections::HashSet;
use std::time::Instant;

use super::event_log::{TraceEvent, TraceEventLog};
use crate::domain::{Argument, EventKind, FunctionId, TraceError};
use crate::export::ReportSink;
use crate::hook::{HookCallback, HookEvent};

/// Active invocation
#[derive(Debug, Clone)]
struct StackFrame {
    function: FunctionId,
    entry: Instant,
    arguments: Vec<Argument>,
}

pub struct CallStackTracker {
    stack: Vec<StackFrame>,
    log: TraceEventLog,
    excluded: HashSet<String>,
    capture_arguments: bool,
    origin: Instant,
    desyncs: usize,
    /// Optional echo of every recorded event
    sink: Option<ReportSink>,
}

impl CallStackTracker {
    #[must_use]
    pub fn new(excluded: HashSet<String>) -> Self {
        Self {
            stack: Vec::new(),
            log: TraceEventLog::new(),
            excluded,
            capture_arguments: true,
            origin: Instant::now(),
            desyncs: 0,
            sink: None,
        }
    }

    /// Keep or drop argument snapshots on `Call` events
    pub fn set_capture_arguments(&mut self, capture: bool) {
        self.capture_arguments = capture;
    }

    /// Echo every recorded event to `sink`
    pub fn set_sink(&mut self, sink: Option<ReportSink>) {
        self.sink = sink;
    }

    /// Start over for a new session: empty stack, empty log, new time origin
    pub fn reset(&mut self, origin: Instant) {
        self.stack.clear();
        self.log.clear();
        self.desyncs = 0;
        self.origin = origin;
    }

    /// Consume one hook transition.
    ///
    /// Returns the recorded event, or `None` for excluded functions.
    pub fn on_event(
        &mut self,
        function: &str,
        module: &str,
        kind: EventKind,
        arguments: Option<Vec<Argument>>,
        timestamp: Instant,
    ) -> Option<TraceEvent> {
        self.record(function, module, kind, arguments, None, timestamp)
    }

    fn record(
        &mut self,
        function: &str,
        module: &str,
        kind: EventKind,
        arguments: Option<Vec<Argument>>,
        error: Option<String>,
        timestamp: Instant,
    ) -> Option<TraceEvent> {
        if self.excluded.contains(function) {
            return None;
        }

        let function = FunctionId::new(function, module);
        let mut event = TraceEvent {
            function,
            kind,
            timestamp,
            offset: timestamp.saturating_duration_since(self.origin),
            arguments: None,
            duration: None,
            error,
        };

        match kind {
            EventKind::Call => {
                let arguments =
                    if self.capture_arguments { arguments.unwrap_or_default() } else { Vec::new() };
                event.arguments = Some(arguments.clone());
                self.stack.push(StackFrame {
                    function: event.function.clone(),
                    entry: timestamp,
                    arguments,
                });
                info!("{}", event.message());
            }
            EventKind::Return => {
                event.duration = self
                    .pop_matching(&event.function)
                    .map(|frame| timestamp.saturating_duration_since(frame.entry));
                info!("{}", event.message());
            }
            EventKind::Exception => {
                match self.stack.iter().rev().find(|f| f.function == event.function) {
                    Some(frame) => {
                        event.duration = Some(timestamp.saturating_duration_since(frame.entry));
                        event.arguments = Some(frame.arguments.clone());
                    }
                    None => self.desync(&event.function),
                }
                warn!("{}", event.message());
            }
        }

        self.log.append(event.clone());
        Some(event)
    }

    /// Pop the nearest frame for `function`, discarding frames above it
    fn pop_matching(&mut self, function: &FunctionId) -> Option<StackFrame> {
        let Some(position) = self.stack.iter().rposition(|f| f.function == *function) else {
            self.desync(function);
            return None;
        };
        let discarded: Vec<StackFrame> = self.stack.drain(position + 1..).collect();
        for frame in &discarded {
            self.desync(&frame.function);
        }
        self.stack.pop()
    }

    fn desync(&mut self, function: &FunctionId) {
        self.desyncs += 1;
        warn!(
            "{}",
            TraceError::StackDesync {
                function: function.name.clone(),
                module: function.module.clone(),
            }
        );
    }

    #[must_use]
    pub fn log(&self) -> &TraceEventLog {
        &self.log
    }

    /// Number of frames currently open
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Functions still open, outermost first
    #[must_use]
    pub fn open_frames(&self) -> Vec<FunctionId> {
        self.stack.iter().map(|f| f.function.clone()).collect()
    }

    #[must_use]
    pub fn desync_count(&self) -> usize {
        self.desyncs
    }
}

impl HookCallback for CallStackTracker {
    fn on_event(&mut self, event: &HookEvent<'_>) -> Result<(), TraceError> {
        let recorded = self.record(
            event.site.name,
            event.site.module,
            event.kind,
            event.arguments.map(<[Argument]>::to_vec),
            event.error.map(str::to_string),
            event.timestamp,
        );
        if let (Some(recorded), Some(sink)) = (recorded, self.sink.as_mut()) {
            sink.write_event(&recorded)?;
        }
        Ok(())
    }
}
