use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use devlens::demo;
use devlens::domain::{EventKind, TraceError};
use devlens::export::ReportSink;
use devlens::hook;
use devlens::profiling::Profiler;
use devlens::trace::Tracer;

/// Writer whose first write fails
#[derive(Default)]
struct FailFirstWrite {
    failed: bool,
}

impl Write for FailFirstWrite {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failed {
            Ok(buf.len())
        } else {
            self.failed = true;
            Err(io::Error::other("disk full"))
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

static LATE_PROBE_FINISHED: AtomicBool = AtomicBool::new(false);

struct ProbesOnDrop;

impl Drop for ProbesOnDrop {
    fn drop(&mut self) {
        demo::g(1);
        let quiet = hook::current_depth() == 0 && !hook::is_installed();
        LATE_PROBE_FINISHED.store(quiet, Ordering::SeqCst);
    }
}

thread_local! {
    static PROBES_ON_DROP: ProbesOnDrop = const { ProbesOnDrop };
}

fn kinds_and_names(tracer: &Tracer) -> Vec<(EventKind, String)> {
    tracer.events().into_iter().map(|e| (e.kind, e.function.name)).collect()
}

fn tree(depth: u32, fanout: u32) -> u32 {
    let _probe = devlens::probe!(depth, fanout);
    if depth == 0 {
        return 1;
    }
    (0..fanout).map(|_| tree(depth - 1, fanout)).sum()
}

fn fails(value: i32) -> Result<i32, String> {
    let probe = devlens::probe!(value);
    probe.observe(if value < 0 { Err(format!("negative: {value}")) } else { Ok(value) })
}

fn panics() {
    let _probe = devlens::probe!();
    panic!("handler crashed");
}

#[test]
fn test_h_scenario_event_order() {
    let mut tracer = Tracer::new();
    tracer.trace(|| demo::h(5)).unwrap();

    let expected: Vec<(EventKind, String)> = [
        (EventKind::Call, "h"),
        (EventKind::Call, "f"),
        (EventKind::Return, "f"),
        (EventKind::Call, "g"),
        (EventKind::Return, "g"),
        (EventKind::Return, "h"),
    ]
    .into_iter()
    .map(|(k, n)| (k, n.to_string()))
    .collect();

    assert_eq!(kinds_and_names(&tracer), expected);
    assert!(tracer.open_frames().is_empty());
    assert_eq!(tracer.desync_count(), 0);

    let events = tracer.events();
    assert_eq!(events[0].function.module, "devlens::demo");
    assert_eq!(events[0].arguments.as_ref().unwrap()[0].to_string(), "arg=5");
    assert!(events[5].duration.unwrap() >= events[2].duration.unwrap());
}

#[test]
fn test_calls_balance_returns_for_nested_trees() {
    for (depth, fanout) in [(0, 1), (1, 3), (3, 2), (4, 1)] {
        let mut tracer = Tracer::new();
        tracer.trace(|| tree(depth, fanout)).unwrap();
        let log = tracer.log();
        assert_eq!(log.count(EventKind::Call), log.count(EventKind::Return));
        assert!(tracer.open_frames().is_empty());
    }
}

#[test]
fn test_stopping_mid_call_leaves_open_frames() {
    fn stops_inside(tracer: &mut Tracer) {
        let _probe = devlens::probe!();
        demo::f(1);
        tracer.stop_trace();
    }

    let mut tracer = Tracer::new();
    tracer.start_trace().unwrap();
    stops_inside(&mut tracer);

    let log = tracer.log();
    let open = tracer.open_frames();
    assert_eq!(log.count(EventKind::Call), log.count(EventKind::Return) + open.len());
    assert_eq!(open[0].name, "stops_inside");
}

#[test]
fn test_err_results_are_recorded_and_returned_unchanged() {
    let mut tracer = Tracer::new();
    let result = tracer.trace(|| fails(-3)).unwrap();
    assert_eq!(result, Err("negative: -3".to_string()));

    let events = tracer.events();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::Call, EventKind::Exception, EventKind::Return]);
    assert_eq!(events[1].error.as_deref(), Some("negative: -3"));
}

#[test]
fn test_panics_record_exception_then_return() {
    let mut tracer = Tracer::new();
    let outcome = tracer.trace(|| std::panic::catch_unwind(panics)).unwrap();
    assert!(outcome.is_err());

    let kinds: Vec<EventKind> = tracer.events().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::Call, EventKind::Exception, EventKind::Return]);
    assert!(tracer.open_frames().is_empty());
}

#[test]
fn test_second_session_rejected_until_stop() {
    let mut first = Tracer::new();
    let mut second = Tracer::new();

    let session = first.session().unwrap();
    assert!(matches!(second.start_trace(), Err(TraceError::AlreadyActive)));
    drop(session);

    assert!(!hook::is_installed());
    second.start_trace().unwrap();
    assert!(second.stop_trace());
}

#[test]
fn test_profiler_coexists_with_trace_session() {
    let mut tracer = Tracer::new();
    let (value, report) = tracer.trace(|| Profiler::run(|| demo::fib(5))).unwrap();

    assert_eq!(value, 5);
    let fib = report.stats_for("fib").unwrap();
    assert_eq!(fib.call_count, 15);
    assert_eq!(tracer.log().count(EventKind::Call), 15);
    assert!(!hook::is_active());
}

#[test]
fn test_sessions_are_per_thread() {
    let mut tracer = Tracer::new();
    tracer.start_trace().unwrap();

    let other_thread = std::thread::spawn(|| {
        let mut tracer = Tracer::new();
        tracer.trace(|| demo::g(2)).map(|()| tracer.events().len())
    })
    .join()
    .unwrap();

    assert_eq!(other_thread.unwrap(), 2);
    assert!(tracer.stop_trace());
    assert!(tracer.events().is_empty());
}

#[test]
fn test_failed_sink_write_still_closes_frame() {
    let mut tracer = Tracer::new().with_sink(ReportSink::to_writer(FailFirstWrite::default()));
    tracer
        .trace(|| {
            demo::h(5);
            demo::g(1);
        })
        .unwrap();

    let kinds = kinds_and_names(&tracer);
    assert_eq!(
        kinds,
        vec![
            (EventKind::Call, "h".to_string()),
            (EventKind::Return, "h".to_string()),
            (EventKind::Call, "g".to_string()),
            (EventKind::Return, "g".to_string()),
        ]
    );
    assert!(tracer.open_frames().is_empty());
    assert_eq!(tracer.desync_count(), 0);
}

#[test]
fn test_probe_after_thread_storage_teardown_is_inert() {
    std::thread::spawn(|| {
        // registered before the hook state, so destroyed after it
        PROBES_ON_DROP.with(|_| {});
        let mut tracer = Tracer::new();
        tracer.trace(|| demo::g(2)).unwrap();
        assert_eq!(tracer.events().len(), 2);
    })
    .join()
    .unwrap();

    assert!(LATE_PROBE_FINISHED.load(Ordering::SeqCst));
}
