//! Local function tracer
//!
//! [`wrap`] and [`wrap_fallible`] instrument one function without touching
//! the thread's hook. The returned closure has the same signature and the
//! same observable behavior as the original; it only adds log lines:
//!
//! ```text
//! calling parse with args "42"
//! parse returned Ok(42) in 3.1µs
//! ```
//!
//! Failures are observed and re-signaled unchanged: an `Err` is returned as
//! is, a panic resumes with its original payload.

use log::{error, info};
use std::backtrace::Backtrace;
use std::fmt::{Debug, Display};
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::domain::TraceError;
use crate::hook::panic_message;

/// Wrap `f`, logging entry, exit, return value and duration of each call
pub fn wrap<A, R, F>(name: &'static str, f: F) -> impl Fn(A) -> R
where
    A: Debug,
    R: Debug,
    F: Fn(A) -> R,
{
    move |args: A| {
        let (result, elapsed) = observe_call(name, args, &f);
        info!("{name} returned {result:?} in {elapsed:?}");
        result
    }
}

/// Wrap fallible `f`; `Err` results are logged with a stack trace and
/// returned unchanged
pub fn wrap_fallible<A, T, E, F>(name: &'static str, f: F) -> impl Fn(A) -> Result<T, E>
where
    A: Debug,
    T: Debug,
    E: Display,
    F: Fn(A) -> Result<T, E>,
{
    move |args: A| {
        let (result, elapsed) = observe_call(name, args, &f);
        match &result {
            Ok(value) => info!("{name} returned Ok({value:?}) in {elapsed:?}"),
            Err(err) => report_failure(name, &err.to_string(), elapsed),
        }
        result
    }
}

/// Log entry, run `f` and time it; panics are logged and resumed
fn observe_call<A: Debug, R>(name: &'static str, args: A, f: &impl Fn(A) -> R) -> (R, Duration) {
    info!("calling {name} with args {args:?}");
    let start = Instant::now();
    match catch_unwind(AssertUnwindSafe(|| f(args))) {
        Ok(result) => (result, start.elapsed()),
        Err(payload) => {
            report_failure(name, &panic_message(payload.as_ref()), start.elapsed());
            resume_unwind(payload)
        }
    }
}

fn report_failure(name: &'static str, message: &str, elapsed: Duration) {
    let failure =
        TraceError::InstrumentedFailure { function: name.to_string(), message: message.to_string() };
    error!("{failure} after {elapsed:?}\nstack trace:\n{}", Backtrace::force_capture());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn divide((a, b): (i32, i32)) -> Result<i32, String> {
        if b == 0 {
            Err("division by zero".to_string())
        } else {
            Ok(a / b)
        }
    }

    #[test]
    fn test_wrap_preserves_return_value() {
        let square = |x: u64| x * x;
        let traced = wrap("square", square);
        for x in [0, 1, 7, 1_000] {
            assert_eq!(traced(x), square(x));
        }
    }

    #[test]
    fn test_wrap_fallible_preserves_ok_and_err() {
        let traced = wrap_fallible("divide", divide);
        assert_eq!(traced((10, 2)), divide((10, 2)));
        assert_eq!(traced((1, 0)), divide((1, 0)));
        assert_eq!(traced((1, 0)).unwrap_err(), "division by zero");
    }

    #[test]
    fn test_wrap_resumes_original_panic_payload() {
        let traced = wrap("explode", |code: u32| -> u32 { std::panic::panic_any(code) });
        let payload = catch_unwind(|| traced(17)).unwrap_err();
        assert_eq!(payload.downcast_ref::<u32>(), Some(&17));
    }

    #[test]
    fn test_independent_wrappers_do_not_interact() {
        let double = wrap("double", |x: i32| x * 2);
        let negate = wrap("negate", |x: i32| -x);
        assert_eq!(double(negate(double(3))), -12);
    }
}
