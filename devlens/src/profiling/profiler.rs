//! Profiler runs and regions
//!
//! Each run attaches its own [`SampleCollector`] as a private hook listener
//! and detaches it when the run ends, on every exit path. Runs never touch
//! the trace-session slot, so they compose with an active `Tracer`.

use log::debug;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Instant;

use super::collector::SampleCollector;
use crate::analysis::Report;
use crate::hook::{self, ListenerId, SharedCallback};

/// Entry points for statistical profiling
pub struct Profiler;

impl Profiler {
    /// Profile every instrumented call made while `f` runs
    pub fn run<R>(f: impl FnOnce() -> R) -> (R, Report) {
        let region = Self::begin_region();
        let result = f();
        (result, region.end())
    }

    /// Start profiling; the region ends with [`Region::end`] or on drop
    #[must_use]
    pub fn begin_region() -> Region {
        let origin = Instant::now();
        let collector = Rc::new(RefCell::new(SampleCollector::new(origin)));
        let callback: SharedCallback = collector.clone();
        let listener = hook::attach_private(callback);
        debug!("profiling region started");
        Region { collector, listener: Some(listener), origin, _not_send: PhantomData }
    }
}

/// Open profiling region
///
/// Dropping a region without calling [`Region::end`] detaches its listener
/// and discards the samples.
#[must_use = "a region stops collecting as soon as it is dropped"]
pub struct Region {
    collector: Rc<RefCell<SampleCollector>>,
    listener: Option<ListenerId>,
    origin: Instant,
    _not_send: PhantomData<*const ()>,
}

impl Region {
    /// Stop collecting and aggregate everything observed into a report
    pub fn end(mut self) -> Report {
        if let Some(id) = self.listener.take() {
            hook::detach_private(id);
        }
        let end = Instant::now();
        let samples = self.collector.borrow_mut().finish(end);
        debug!("profiling region ended with {} samples", samples.len());
        Report::from_samples(samples, end.saturating_duration_since(self.origin))
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        if let Some(id) = self.listener.take() {
            hook::detach_private(id);
        }
    }
}
