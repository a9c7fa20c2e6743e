//! Raw call sample collection
//!
//! A [`SampleCollector`] is the private hook listener of one profiler run.
//! It keeps its own call path, independent of any trace session, and turns
//! every completed invocation into a [`CallSample`].

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::domain::{EventKind, FunctionId, TraceError};
use crate::hook::{HookCallback, HookEvent};

/// One completed invocation, as persisted in profiling snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSample {
    pub function: FunctionId,
    /// Direct caller, `None` for calls made at the top of the region
    pub caller: Option<FunctionId>,
    /// Entry time relative to the region start
    pub start_ns: u64,
    pub elapsed_ns: u64,
    /// Sum of `elapsed_ns` of direct child calls
    pub children_ns: u64,
    /// The function was already on the active call path when entered
    pub recursive: bool,
    /// The invocation raised (returned `Err` or unwound)
    pub raised: bool,
}

impl CallSample {
    /// Time spent in this invocation outside nested instrumented calls
    #[must_use]
    pub fn own_ns(&self) -> u64 {
        self.elapsed_ns.saturating_sub(self.children_ns)
    }
}

pub(crate) fn as_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[derive(Debug)]
struct OpenCall {
    function: FunctionId,
    start: Instant,
    children: Duration,
    recursive: bool,
    raised: bool,
}

#[derive(Debug)]
pub struct SampleCollector {
    origin: Instant,
    stack: Vec<OpenCall>,
    samples: Vec<CallSample>,
}

impl SampleCollector {
    #[must_use]
    pub fn new(origin: Instant) -> Self {
        Self { origin, stack: Vec::new(), samples: Vec::new() }
    }

    pub fn enter(&mut self, function: FunctionId, at: Instant) {
        let recursive = self.stack.iter().any(|open| open.function == function);
        self.stack.push(OpenCall {
            function,
            start: at,
            children: Duration::ZERO,
            recursive,
            raised: false,
        });
    }

    /// Close the nearest open call of `function`.
    ///
    /// Calls opened above it never reported their return; they are closed
    /// at the same instant so their time is still attributed.
    pub fn leave(&mut self, function: &FunctionId, at: Instant) {
        let Some(position) = self.stack.iter().rposition(|open| open.function == *function) else {
            log::warn!(
                "{}",
                TraceError::StackDesync {
                    function: function.name.clone(),
                    module: function.module.clone(),
                }
            );
            return;
        };
        while self.stack.len() > position {
            self.close_top(at);
        }
    }

    pub fn mark_raised(&mut self, function: &FunctionId) {
        if let Some(open) = self.stack.iter_mut().rev().find(|open| open.function == *function) {
            open.raised = true;
        }
    }

    fn close_top(&mut self, at: Instant) {
        let Some(open) = self.stack.pop() else {
            return;
        };
        let elapsed = at.saturating_duration_since(open.start);
        let caller = self.stack.last_mut().map(|parent| {
            parent.children += elapsed;
            parent.function.clone()
        });
        self.samples.push(CallSample {
            function: open.function,
            caller,
            start_ns: as_nanos(open.start.saturating_duration_since(self.origin)),
            elapsed_ns: as_nanos(elapsed),
            children_ns: as_nanos(open.children),
            recursive: open.recursive,
            raised: open.raised,
        });
    }

    /// Close every call still open at `at` and hand over the samples
    pub fn finish(&mut self, at: Instant) -> Vec<CallSample> {
        while !self.stack.is_empty() {
            self.close_top(at);
        }
        std::mem::take(&mut self.samples)
    }

    /// Number of calls currently open
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl HookCallback for SampleCollector {
    fn on_event(&mut self, event: &HookEvent<'_>) -> Result<(), TraceError> {
        let function = event.site.function_id();
        match event.kind {
            EventKind::Call => self.enter(function, event.timestamp),
            EventKind::Return => self.leave(&function, event.timestamp),
            EventKind::Exception => self.mark_raised(&function),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> FunctionId {
        FunctionId::new(name, "app")
    }

    #[test]
    fn test_children_time_propagates_to_parent() {
        let t0 = Instant::now();
        let mut c = SampleCollector::new(t0);
        c.enter(id("parent"), t0);
        c.enter(id("child"), t0 + Duration::from_millis(1));
        c.leave(&id("child"), t0 + Duration::from_millis(4));
        c.leave(&id("parent"), t0 + Duration::from_millis(10));

        let samples = c.finish(t0 + Duration::from_millis(10));
        assert_eq!(samples.len(), 2);
        let child = &samples[0];
        assert_eq!(child.caller, Some(id("parent")));
        assert_eq!(child.elapsed_ns, 3_000_000);
        assert_eq!(child.start_ns, 1_000_000);
        let parent = &samples[1];
        assert_eq!(parent.children_ns, 3_000_000);
        assert_eq!(parent.own_ns(), 7_000_000);
    }

    #[test]
    fn test_recursion_is_flagged() {
        let t0 = Instant::now();
        let mut c = SampleCollector::new(t0);
        c.enter(id("fib"), t0);
        c.enter(id("fib"), t0);
        c.leave(&id("fib"), t0);
        c.leave(&id("fib"), t0);

        let samples = c.finish(t0);
        assert!(samples[0].recursive);
        assert!(!samples[1].recursive);
    }

    #[test]
    fn test_finish_closes_open_calls() {
        let t0 = Instant::now();
        let mut c = SampleCollector::new(t0);
        c.enter(id("outer"), t0);
        c.enter(id("inner"), t0);
        c.mark_raised(&id("inner"));

        let samples = c.finish(t0 + Duration::from_millis(2));
        assert_eq!(c.depth(), 0);
        assert_eq!(samples.len(), 2);
        assert!(samples[0].raised);
        assert_eq!(samples[1].elapsed_ns, 2_000_000);
    }

    #[test]
    fn test_unmatched_leave_is_ignored() {
        let t0 = Instant::now();
        let mut c = SampleCollector::new(t0);
        c.enter(id("a"), t0);
        c.leave(&id("ghost"), t0);
        assert_eq!(c.depth(), 1);
    }
}
