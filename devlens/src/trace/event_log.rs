//! Trace event log
//!
//! Append-only record of every transition the tracker observed during one
//! session. Owned by a single tracer; not shared across threads.

use std::time::{Duration, Instant};

use crate::domain::{render_arguments, Argument, EventKind, FunctionId};

/// Represents a single recorded transition
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub function: FunctionId,
    pub kind: EventKind,
    /// Monotonic instant the hook observed the transition
    pub timestamp: Instant,
    /// Time since the session started
    pub offset: Duration,
    /// Argument snapshot, present on `Call` events
    pub arguments: Option<Vec<Argument>>,
    /// Time since the matching entry, on `Return`/`Exception` when known
    pub duration: Option<Duration>,
    /// Rendered failure on `Exception` events
    pub error: Option<String>,
}

impl TraceEvent {
    /// Human-readable description used for log lines and sink output
    #[must_use]
    pub fn message(&self) -> String {
        let FunctionId { name, module } = &self.function;
        match self.kind {
            EventKind::Call => {
                let args = self.arguments.as_deref().map(render_arguments).unwrap_or_default();
                format!("entering {name} in module {module} with args ({args})")
            }
            EventKind::Return => format!("exited {name} in module {module}"),
            EventKind::Exception => match &self.error {
                Some(error) => format!("exception in {name}: {error}"),
                None => format!("exception in {name}"),
            },
        }
    }
}

/// Ordered, append-only sequence of trace events
#[derive(Debug, Default)]
pub struct TraceEventLog {
    events: Vec<TraceEvent>,
}

impl TraceEventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    /// All events in insertion order
    #[must_use]
    pub fn all(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter()
    }

    /// Drop every event; only called when a new session starts
    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events of the given kind
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Events recorded for one function, matched on its local name
    pub fn for_function<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TraceEvent> + 'a {
        self.events.iter().filter(move |e| e.function.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, kind: EventKind) -> TraceEvent {
        TraceEvent {
            function: FunctionId::new(name, "app"),
            kind,
            timestamp: Instant::now(),
            offset: Duration::ZERO,
            arguments: None,
            duration: None,
            error: None,
        }
    }

    #[test]
    fn test_log_keeps_insertion_order() {
        let mut log = TraceEventLog::new();
        log.append(event("h", EventKind::Call));
        log.append(event("f", EventKind::Call));
        log.append(event("f", EventKind::Return));

        let names: Vec<&str> = log.iter().map(|e| e.function.name.as_str()).collect();
        assert_eq!(names, vec!["h", "f", "f"]);
        assert_eq!(log.count(EventKind::Call), 2);
        assert_eq!(log.for_function("f").count(), 2);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_messages() {
        let mut call = event("h", EventKind::Call);
        call.arguments = Some(vec![Argument::new("arg", "5")]);
        assert_eq!(call.message(), "entering h in module app with args (arg=5)");
        assert_eq!(event("h", EventKind::Return).message(), "exited h in module app");

        let mut raised = event("h", EventKind::Exception);
        assert_eq!(raised.message(), "exception in h");
        raised.error = Some("division by zero".to_string());
        assert_eq!(raised.message(), "exception in h: division by zero");
    }
}
