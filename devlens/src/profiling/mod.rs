//! Profiling core modules
//!
//! - `collector`: private hook listener producing raw call samples
//! - `profiler`: run and region entry points
//! - `profile_code`: per-callable profiling wrapper

pub mod collector;
pub mod profile_code;
pub mod profiler;

// Re-export common types
pub use collector::{CallSample, SampleCollector};
pub use profile_code::{profile_code, ProfileOptions, ProfiledFn};
pub use profiler::{Profiler, Region};
