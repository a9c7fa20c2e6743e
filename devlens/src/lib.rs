//! # devlens - Function-Level Tracing and Profiling
//!
//! devlens observes function-level execution of instrumented Rust code:
//! which functions are entered and exited, with what arguments, how long
//! they take and whether they fail. It serves two use cases:
//!
//! - **Tracing**: a continuous call-level log of a run (entry, exit and
//!   exception events with timestamps and argument snapshots)
//! - **Profiling**: per-function call counts, cumulative time and own time,
//!   sortable and optionally persisted
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Instrumented Functions                       │
//! │              let _probe = devlens::probe!(args);                │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ Call / Return / Exception
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Hook (thread-local, `hook`)                    │
//! │   session slot (one per thread)   private listeners (profiler)  │
//! └──────────────┬───────────────────────────────┬──────────────────┘
//!                │                               │
//!                ▼                               ▼
//! ┌──────────────────────────┐     ┌──────────────────────────────┐
//! │  Call Stack Tracker      │     │  Sample Collector            │
//! │  (`trace::stack`)        │     │  (`profiling::collector`)    │
//! └────────────┬─────────────┘     └──────────────┬───────────────┘
//!              ▼                                  ▼
//! ┌──────────────────────────┐     ┌──────────────────────────────┐
//! │  Trace Event Log         │     │  Report / FunctionStats      │
//! │  (`trace::event_log`)    │     │  (`analysis`)                │
//! └────────────┬─────────────┘     └──────────────┬───────────────┘
//!              └────────────────┬─────────────────┘
//!                               ▼
//!              ┌──────────────────────────────────┐
//!              │  Export: text sink, Chrome trace,│
//!              │  profiling snapshots             │
//!              └──────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`hook`]: probe points, the per-thread session slot and private listeners
//! - [`trace`]: call stack tracker, event log and `Tracer` sessions
//! - [`profiling`]: profiler runs/regions, raw samples, `profile_code` wrapper
//! - [`analysis`]: per-function aggregation, sorted reports, snapshots
//! - [`wrapper`]: hook-free logging wrappers for single functions
//! - [`export`]: text sink and Chrome Trace Event Format export
//! - [`domain`]: function identity, event kinds, sort keys and errors
//! - [`cli`]: command-line arguments and logger setup for the binary
//! - [`demo`]: instrumented workloads used by the binary
//!
//! ## Typical Usage
//!
//! ```
//! use devlens::trace::Tracer;
//!
//! fn square(x: u32) -> u32 {
//!     let _probe = devlens::probe!(x);
//!     x * x
//! }
//!
//! let mut tracer = Tracer::new();
//! let value = tracer.trace(|| square(4)).unwrap();
//! assert_eq!(value, 16);
//! assert_eq!(tracer.events().len(), 2);
//! ```
//!
//! ## Key Concepts
//!
//! - **Session**: one installed tracer per thread, from start to stop
//! - **Cumulative time**: elapsed time of a call including nested calls
//! - **Own time**: elapsed time excluding nested instrumented calls
//! - **Primitive call**: a call not made from inside an activation of the
//!   same function

pub mod analysis;
pub mod cli;
pub mod demo;
pub mod domain;
pub mod export;
pub mod hook;
pub mod profiling;
pub mod trace;
pub mod wrapper;
