//! Bundled workloads used by the `devlens` binary
//!
//! Small instrumented call trees: `test_func` fans out to `f`, `g` and `h`
//! for tracing; `profile_example` sums a range in chunks and evaluates a
//! recursive Fibonacci for profiling.

use log::debug;

use crate::domain::CallSite;
use crate::probe;

/// Site under which the binary profiles [`profile_example`]
pub const PROFILE_RUN_SITE: CallSite = CallSite::new("profile_run", module_path!());

pub fn f(arg: i32) {
    let _probe = probe!(arg);
    debug!("{arg}");
    debug!("ajajaja");
}

pub fn g(arg: i32) {
    let _probe = probe!(arg);
    debug!("{arg}");
}

pub fn h(arg: i32) {
    let _probe = probe!(arg);
    f(arg);
    g(arg);
}

pub fn test_func(x: i32, y: i32, z: i32) -> i32 {
    let _probe = probe!(x, y, z);
    f(123);
    g(456);
    h(789);
    x + y + z
}

/// Sum `start..end`
pub fn accumulate(start: u64, end: u64) -> u64 {
    let _probe = probe!(start, end);
    (start..end).sum()
}

pub fn fib(n: u32) -> u64 {
    let _probe = probe!(n);
    if n < 2 {
        u64::from(n)
    } else {
        fib(n - 1) + fib(n - 2)
    }
}

/// Sum of `0..100_000` computed in ten chunks, plus `fib(10)`
pub fn profile_example() -> (u64, u64) {
    let _probe = probe!();
    let total = (0..10).map(|chunk| accumulate(chunk * 10_000, (chunk + 1) * 10_000)).sum();
    (total, fib(10))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ReportSink;
    use crate::profiling::{profile_code, ProfileOptions};

    #[test]
    fn test_workloads_compute_expected_values() {
        assert_eq!(test_func(5, 10, 15), 30);
        assert_eq!(profile_example(), (4_999_950_000, 55));
    }

    #[test]
    fn test_profile_run_site_has_its_own_row() {
        let mut profiled = profile_code(PROFILE_RUN_SITE, ProfileOptions::default(), |()| profile_example())
            .with_sink(ReportSink::to_writer(std::io::sink()));
        profiled.call(()).unwrap();

        let report = profiled.last_report().unwrap();
        let names: Vec<&str> = report.stats().iter().map(|s| s.function.name.as_str()).collect();
        assert_eq!(names.iter().filter(|n| **n == "profile_example").count(), 1);
        assert_eq!(report.stats_for("profile_run").unwrap().call_count, 1);
    }
}
