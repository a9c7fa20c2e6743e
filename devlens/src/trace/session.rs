//! Trace sessions
//!
//! A [`Tracer`] owns a call stack tracker and its event log. Starting a
//! session installs the tracker in the thread's hook slot; stopping it
//! uninstalls it. [`Tracer::session`] returns a guard that stops the session
//! on every exit path, including unwinding.

use log::{debug, info};
use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Instant;

use super::event_log::{TraceEvent, TraceEventLog};
use super::stack::CallStackTracker;
use crate::domain::{FunctionId, TraceError};
use crate::export::ReportSink;
use crate::hook::{self, ListenerId, SharedCallback, DEFAULT_EXCLUDED};

/// Trace session configuration
#[derive(Debug, Clone)]
pub struct TracerConfig {
    /// Local function names never recorded
    pub excluded_functions: HashSet<String>,
    /// Record argument snapshots on `Call` events
    pub capture_arguments: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            excluded_functions: DEFAULT_EXCLUDED.iter().map(ToString::to_string).collect(),
            capture_arguments: true,
        }
    }
}

/// Hook-based tracer for the current thread
pub struct Tracer {
    tracker: Rc<RefCell<CallStackTracker>>,
    excluded: HashSet<String>,
    listener: Option<ListenerId>,
}

impl Tracer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TracerConfig::default())
    }

    #[must_use]
    pub fn with_config(config: TracerConfig) -> Self {
        let mut tracker = CallStackTracker::new(config.excluded_functions.clone());
        tracker.set_capture_arguments(config.capture_arguments);
        Self {
            tracker: Rc::new(RefCell::new(tracker)),
            excluded: config.excluded_functions,
            listener: None,
        }
    }

    /// Echo every recorded event to `sink` while tracing
    #[must_use]
    pub fn with_sink(self, sink: ReportSink) -> Self {
        self.tracker.borrow_mut().set_sink(Some(sink));
        self
    }

    /// Install the tracer on this thread's hook, clearing the previous log.
    ///
    /// # Errors
    /// Returns [`TraceError::AlreadyActive`] if this tracer or any other
    /// session is already tracing on this thread.
    pub fn start_trace(&mut self) -> Result<(), TraceError> {
        if self.listener.is_some() {
            return Err(TraceError::AlreadyActive);
        }
        self.tracker.borrow_mut().reset(Instant::now());
        let callback: SharedCallback = self.tracker.clone();
        self.listener = Some(hook::install(callback, self.excluded.clone())?);
        debug!("trace session started");
        Ok(())
    }

    /// Uninstall the tracer. Returns `false` if no session was active.
    pub fn stop_trace(&mut self) -> bool {
        let Some(id) = self.listener.take() else {
            return false;
        };
        hook::uninstall(id);
        let tracker = self.tracker.borrow();
        info!(
            "trace session stopped: {} events, {} open frames, {} stack desyncs",
            tracker.log().len(),
            tracker.depth(),
            tracker.desync_count()
        );
        true
    }

    /// Start a session that stops when the returned guard drops.
    ///
    /// # Errors
    /// Returns [`TraceError::AlreadyActive`] if a session is already active.
    pub fn session(&mut self) -> Result<TraceSession<'_>, TraceError> {
        self.start_trace()?;
        Ok(TraceSession { tracer: self })
    }

    /// Trace everything `f` does, stopping the session even if `f` panics.
    ///
    /// # Errors
    /// Returns [`TraceError::AlreadyActive`] if a session is already active;
    /// `f` is not run in that case.
    pub fn trace<R>(&mut self, f: impl FnOnce() -> R) -> Result<R, TraceError> {
        let _session = self.session()?;
        Ok(f())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.listener.is_some()
    }

    /// Read-only view of the event log
    #[must_use]
    pub fn log(&self) -> Ref<'_, TraceEventLog> {
        Ref::map(self.tracker.borrow(), CallStackTracker::log)
    }

    /// Copy of all recorded events in order
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.log().all().to_vec()
    }

    /// Frames opened during the session that never returned
    #[must_use]
    pub fn open_frames(&self) -> Vec<FunctionId> {
        self.tracker.borrow().open_frames()
    }

    #[must_use]
    pub fn desync_count(&self) -> usize {
        self.tracker.borrow().desync_count()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        self.stop_trace();
    }
}

/// Active trace session; stops tracing when dropped
pub struct TraceSession<'a> {
    tracer: &'a mut Tracer,
}

impl TraceSession<'_> {
    #[must_use]
    pub fn tracer(&self) -> &Tracer {
        self.tracer
    }

    /// Stop explicitly instead of waiting for drop
    pub fn stop(self) {}
}

impl Drop for TraceSession<'_> {
    fn drop(&mut self) {
        self.tracer.stop_trace();
    }
}
