//! # Instrumentation Hook
//!
//! Thread-local callback slot that receives every function-boundary event
//! raised by instrumented code on the current thread.
//!
//! ## Probe Points
//!
//! Rust has no interpreter-level trace callback, so instrumented functions
//! carry an explicit probe. A probe returns a [`CallGuard`]:
//!
//! ```text
//! fn h(arg: i32) {
//!     let _probe = devlens::probe!(arg);   ──► Call   (arguments rendered now)
//!     f(arg);
//!     g(arg);
//! }                                        ──► Return (guard drop)
//! ```
//!
//! An `Err` passed through [`CallGuard::observe`] or a panic unwinding
//! through the guard produces an `Exception` event before the `Return`.
//!
//! ## Listeners
//!
//! - **Session slot**: at most one per thread, installed by a trace session.
//!   A second [`install`] fails with [`TraceError::AlreadyActive`].
//! - **Private listeners**: owned by profiler runs. Any number may be
//!   attached, each with its own callback instance.
//!
//! A listener only sees frames entered after it was attached, so the frame
//! that starts a session never produces an unmatched `Return`.
//!
//! ## Failure Isolation
//!
//! A callback that returns `Err` or panics is logged and muted for the rest
//! of the current branch. It still receives the `Return` of the frame that
//! triggered the failure and is unmuted from there on. The instrumented
//! program never observes the failure, even when a probe runs after the
//! thread's local storage has been torn down. Events raised while a
//! callback is already running are dropped for that callback.
//!
//! # Performance
//!
//! With no listener attached a probe costs one thread-local counter update;
//! argument rendering is skipped entirely.

use log::error;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::Display;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Instant;

use crate::domain::{Argument, CallSite, EventKind, TraceError};

/// Function names a trace session never records.
///
/// These are the session's own entry points, so tracing them would recurse
/// into the tracer itself.
pub const DEFAULT_EXCLUDED: &[&str] = &["start_trace", "stop_trace", "enter", "exit"];

/// Event delivered to a hook callback
#[derive(Debug)]
pub struct HookEvent<'a> {
    pub site: CallSite,
    pub kind: EventKind,
    /// Present on `Call` events
    pub arguments: Option<&'a [Argument]>,
    /// Rendered failure on `Exception` events
    pub error: Option<&'a str>,
    pub timestamp: Instant,
    /// Nesting depth of the frame on this thread (1 = outermost probe)
    pub depth: usize,
}

/// Receiver of hook events
pub trait HookCallback {
    /// Handle one event.
    ///
    /// # Errors
    /// An error mutes this callback for the current branch; it is never
    /// propagated to instrumented code.
    fn on_event(&mut self, event: &HookEvent<'_>) -> Result<(), TraceError>;
}

/// Callback shared between its owner and the hook
pub type SharedCallback = Rc<RefCell<dyn HookCallback>>;

/// Handle identifying an attached listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    callback: SharedCallback,
    excluded: HashSet<String>,
    /// Frames at or below this depth were entered before attachment
    base_depth: usize,
    /// Depth of the frame whose event made the callback fail
    muted_at: Option<usize>,
}

impl Listener {
    /// Decide whether an event reaches this listener, updating the mute state
    fn accepts(&mut self, site: &CallSite, kind: EventKind, depth: usize) -> bool {
        if depth <= self.base_depth || self.excluded.contains(site.name) {
            return false;
        }
        match self.muted_at {
            Some(muted) if depth > muted => false,
            // The frame that failed still closes, only its descendants are dropped
            Some(muted) if depth == muted => {
                if kind == EventKind::Return {
                    self.muted_at = None;
                    true
                } else {
                    false
                }
            }
            Some(_) => {
                self.muted_at = None;
                true
            }
            None => true,
        }
    }
}

#[derive(Default)]
struct HookState {
    session: Option<Listener>,
    private: Vec<Listener>,
    depth: usize,
    next_id: u64,
}

impl HookState {
    fn allocate_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    fn listener_mut(&mut self, id: ListenerId) -> Option<&mut Listener> {
        self.session.iter_mut().chain(self.private.iter_mut()).find(|l| l.id == id)
    }
}

thread_local! {
    static HOOK: RefCell<HookState> = RefCell::new(HookState::default());
}

// =============================================================================
// INSTALLATION
// =============================================================================

/// Install the session callback for the current thread.
///
/// # Errors
/// Returns [`TraceError::AlreadyActive`] if a session callback is installed.
pub fn install(callback: SharedCallback, excluded: HashSet<String>) -> Result<ListenerId, TraceError> {
    HOOK.with(|cell| {
        let mut state = cell.borrow_mut();
        if state.session.is_some() {
            return Err(TraceError::AlreadyActive);
        }
        let id = state.allocate_id();
        let base_depth = state.depth;
        state.session = Some(Listener { id, callback, excluded, base_depth, muted_at: None });
        Ok(id)
    })
}

/// Remove the session callback if it is the one identified by `id`.
///
/// Returns `false` when nothing was removed. No callback for this listener
/// runs after this returns.
pub fn uninstall(id: ListenerId) -> bool {
    HOOK.try_with(|cell| {
        let mut state = cell.borrow_mut();
        if state.session.as_ref().is_some_and(|l| l.id == id) {
            state.session = None;
            true
        } else {
            false
        }
    })
    .unwrap_or(false)
}

/// Attach a private listener that coexists with the session slot.
pub fn attach_private(callback: SharedCallback) -> ListenerId {
    HOOK.with(|cell| {
        let mut state = cell.borrow_mut();
        let id = state.allocate_id();
        let base_depth = state.depth;
        state.private.push(Listener {
            id,
            callback,
            excluded: HashSet::new(),
            base_depth,
            muted_at: None,
        });
        id
    })
}

/// Detach a private listener. Returns `false` if it was not attached.
pub fn detach_private(id: ListenerId) -> bool {
    HOOK.try_with(|cell| {
        let mut state = cell.borrow_mut();
        let before = state.private.len();
        state.private.retain(|l| l.id != id);
        state.private.len() != before
    })
    .unwrap_or(false)
}

/// Whether a session callback is installed on this thread
#[must_use]
pub fn is_installed() -> bool {
    HOOK.try_with(|cell| cell.borrow().session.is_some()).unwrap_or(false)
}

/// Whether any listener (session or private) is attached on this thread
#[must_use]
pub fn is_active() -> bool {
    HOOK.try_with(|cell| {
        let state = cell.borrow();
        state.session.is_some() || !state.private.is_empty()
    })
    .unwrap_or(false)
}

/// Current probe nesting depth on this thread
#[must_use]
pub fn current_depth() -> usize {
    HOOK.try_with(|cell| cell.borrow().depth).unwrap_or(0)
}

// =============================================================================
// DISPATCH
// =============================================================================

fn dispatch(
    site: CallSite,
    kind: EventKind,
    depth: usize,
    arguments: Option<&[Argument]>,
    error: Option<&str>,
) {
    // Select targets under a short borrow; callbacks run without it held so
    // they may install, detach or hit probes of their own.
    let targets: Vec<(ListenerId, SharedCallback)> = match HOOK.try_with(|cell| {
        let mut guard = cell.borrow_mut();
        let state = &mut *guard;
        state
            .session
            .iter_mut()
            .chain(state.private.iter_mut())
            .filter_map(|l| l.accepts(&site, kind, depth).then(|| (l.id, Rc::clone(&l.callback))))
            .collect()
    }) {
        Ok(targets) => targets,
        Err(_) => return,
    };

    if targets.is_empty() {
        return;
    }

    let event = HookEvent { site, kind, arguments, error, timestamp: Instant::now(), depth };

    for (id, callback) in targets {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            callback.try_borrow_mut().ok().map(|mut cb| cb.on_event(&event))
        }));
        let failure = match outcome {
            Ok(None | Some(Ok(()))) => continue,
            Ok(Some(Err(err))) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        error!(
            "{}",
            TraceError::CallbackFailed(format!(
                "{kind} of {}::{}: {failure}; tracing stopped for this branch",
                site.module, site.name
            ))
        );
        if kind != EventKind::Return {
            mute(id, depth);
        }
    }
}

fn mute(id: ListenerId, depth: usize) {
    let _ = HOOK.try_with(|cell| {
        if let Some(listener) = cell.borrow_mut().listener_mut(id) {
            listener.muted_at = Some(depth);
        }
    });
}

/// Render a panic payload the way the default panic hook does
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

// =============================================================================
// PROBES
// =============================================================================

/// Depth of a guard created after the hook state was destroyed
const INERT_DEPTH: usize = 0;

/// Open frame of an instrumented function.
///
/// Dropping the guard records the return. Not `Send`: the hook state it
/// reports to belongs to the thread that entered the frame.
#[must_use = "dropping the guard immediately records the function as returned"]
pub struct CallGuard {
    site: CallSite,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl CallGuard {
    /// Identity of the probed function
    #[must_use]
    pub fn site(&self) -> CallSite {
        self.site
    }

    /// Record an `Exception` for `Err` results and return `result` unchanged
    ///
    /// # Errors
    /// Returns the original error untouched.
    pub fn observe<T, E: Display>(&self, result: Result<T, E>) -> Result<T, E> {
        if let Err(ref err) = result {
            self.raise(err);
        }
        result
    }

    /// Record an `Exception` event for this frame without closing it
    pub fn raise(&self, error: &dyn Display) {
        if is_active() {
            let message = error.to_string();
            dispatch(self.site, EventKind::Exception, self.depth, None, Some(&message));
        }
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if self.depth == INERT_DEPTH {
            return;
        }
        if is_active() {
            if std::thread::panicking() {
                dispatch(self.site, EventKind::Exception, self.depth, None, Some("panic"));
            }
            dispatch(self.site, EventKind::Return, self.depth, None, None);
        }
        let _ = HOOK.try_with(|cell| {
            let mut state = cell.borrow_mut();
            state.depth = state.depth.saturating_sub(1);
        });
    }
}

/// Enter an instrumented frame with already rendered arguments
pub fn enter(site: CallSite, arguments: Vec<Argument>) -> CallGuard {
    enter_with(site, || arguments)
}

/// Enter an instrumented frame, rendering arguments only if someone listens
pub fn enter_with<F>(site: CallSite, arguments: F) -> CallGuard
where
    F: FnOnce() -> Vec<Argument>,
{
    let Ok(depth) = HOOK.try_with(|cell| {
        let mut state = cell.borrow_mut();
        state.depth += 1;
        state.depth
    }) else {
        return CallGuard { site, depth: INERT_DEPTH, _not_send: PhantomData };
    };
    if is_active() {
        let rendered = arguments();
        dispatch(site, EventKind::Call, depth, Some(&rendered), None);
    }
    CallGuard { site, depth, _not_send: PhantomData }
}

/// Run `f` as an instrumented frame
pub fn call<R>(site: CallSite, arguments: Vec<Argument>, f: impl FnOnce() -> R) -> R {
    let _guard = enter(site, arguments);
    f()
}

/// Run fallible `f` as an instrumented frame, recording `Err` as an exception
///
/// # Errors
/// Returns whatever `f` returns, unchanged.
pub fn try_call<T, E: Display>(
    site: CallSite,
    arguments: Vec<Argument>,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let guard = enter(site, arguments);
    guard.observe(f())
}

/// Strip a `type_name` path down to the enclosing function's local name
#[doc(hidden)]
#[must_use]
pub fn local_name(type_path: &'static str) -> &'static str {
    let mut path = type_path.strip_suffix("::__devlens_marker").unwrap_or(type_path);
    while let Some(stripped) = path.strip_suffix("::{{closure}}") {
        path = stripped;
    }
    path.rsplit("::").next().unwrap_or(path)
}

/// Local name of the enclosing function
#[macro_export]
macro_rules! function_name {
    () => {{
        fn __devlens_marker() {}
        fn __devlens_type_name<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::hook::local_name(__devlens_type_name(__devlens_marker))
    }};
}

/// [`CallSite`] of the enclosing function
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::domain::CallSite::new($crate::function_name!(), module_path!())
    };
}

/// Instrument the enclosing function, capturing the named arguments.
///
/// ```
/// fn area(width: u32, height: u32) -> u32 {
///     let _probe = devlens::probe!(width, height);
///     width * height
/// }
/// assert_eq!(area(3, 4), 12);
/// ```
#[macro_export]
macro_rules! probe {
    () => {
        $crate::hook::enter_with($crate::call_site!(), ::std::vec::Vec::new)
    };
    ($($arg:ident),+ $(,)?) => {
        $crate::hook::enter_with($crate::call_site!(), || {
            ::std::vec![$($crate::domain::Argument::new(
                stringify!($arg),
                format!("{:?}", $arg),
            )),+]
        })
    };
}
