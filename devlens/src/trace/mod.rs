//! Hook-based call tracing
//!
//! - `stack`: correlates hook events into frames and durations
//! - `event_log`: append-only log of recorded events
//! - `session`: `Tracer` and its scoped session guard

pub mod event_log;
pub mod session;
pub mod stack;

pub use event_log::{TraceEvent, TraceEventLog};
pub use session::{TraceSession, Tracer, TracerConfig};
pub use stack::CallStackTracker;
