//! Process-wide crash hooks for the active CrashBufferTree
//!
//! One crash buffer at a time is reachable from the hooks, through a weak
//! back-reference; its owner is whoever built it. The hooks are:
//!
//! - a panic hook that flushes, then chains to the previous hook. Panics
//!   raised inside [`contain_tree_panic`] are recovered by the dispatcher
//!   and skip the flush;
//! - an `atexit` hook that flushes on normal process exit;
//! - (unix) handlers for SIGABRT, SIGSEGV, SIGBUS, SIGFPE and SIGILL.
//!
//! Signal handlers only raise an atomic flag and restore the default
//! disposition; [`crash_checkpoint`] performs the flush at the next log
//! call. A fault that kills the process before another log call or exit
//! hook runs is not persisted.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once, PoisonError, TryLockError, Weak};

use tracing::{debug, warn};

use crate::trees::CrashBufferTree;

static ACTIVE: Mutex<Option<Weak<CrashBufferTree>>> = Mutex::new(None);
static CRASH_SIGNALLED: AtomicBool = AtomicBool::new(false);
static HOOKS: Once = Once::new();

thread_local! {
    static CONTAINED_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Make `tree` the buffer flushed on panic, exit and fatal signals.
///
/// Replaces any previously registered buffer. The hooks themselves are
/// registered once per process.
pub fn install_crash_hooks(tree: &Arc<CrashBufferTree>) {
    *ACTIVE.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(tree));

    HOOKS.call_once(|| {
        install_panic_hook();
        install_exit_hook();
        install_signal_handlers();
        debug!(target: "canopy::diagnostics", "Crash hooks installed");
    });
}

/// Detach the registered buffer; the hooks stay installed but do nothing
pub fn clear_crash_hooks() {
    *ACTIVE.lock().unwrap_or_else(PoisonError::into_inner) = None;
}

/// The buffer currently reachable from the hooks
pub fn active_crash_buffer() -> Option<Arc<CrashBufferTree>> {
    ACTIVE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .and_then(Weak::upgrade)
}

/// Mark that a fatal signal was observed; async-signal-safe
pub fn raise_crash_flag() {
    CRASH_SIGNALLED.store(true, Ordering::SeqCst);
}

pub fn crash_flag_raised() -> bool {
    CRASH_SIGNALLED.load(Ordering::SeqCst)
}

/// Flush the active buffer if a fatal signal was flagged.
///
/// Returns whether a flush was attempted. Called at the start of every
/// forest log call.
pub fn crash_checkpoint() -> bool {
    if !CRASH_SIGNALLED.swap(false, Ordering::AcqRel) {
        return false;
    }
    warn!(target: "canopy::diagnostics", "Fatal signal flagged, flushing crash buffer");
    flush_active();
    true
}

/// Run a tree call whose panic the caller recovers from.
///
/// The panic hook does not flush the crash buffer for panics raised here.
pub(crate) fn contain_tree_panic<T>(f: impl FnOnce() -> T) -> std::thread::Result<T> {
    CONTAINED_DEPTH.with(|d| d.set(d.get() + 1));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CONTAINED_DEPTH.with(|d| d.set(d.get() - 1));
    result
}

fn in_contained_call() -> bool {
    CONTAINED_DEPTH.with(Cell::get) > 0
}

fn flush_active() {
    // ACTIVE may be held by the thread that is panicking
    let tree = match ACTIVE.try_lock() {
        Ok(guard) => guard.as_ref().and_then(Weak::upgrade),
        Err(TryLockError::Poisoned(p)) => p.into_inner().as_ref().and_then(Weak::upgrade),
        Err(TryLockError::WouldBlock) => None,
    };
    if let Some(tree) = tree {
        tree.flush_if_unlocked();
    }
}

fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if !in_contained_call() {
            flush_active();
        }
        previous(info);
    }));
}

extern "C" fn flush_on_exit() {
    // unwinding out of an extern "C" fn aborts
    let _ = panic::catch_unwind(AssertUnwindSafe(flush_active));
}

fn install_exit_hook() {
    // SAFETY: `flush_on_exit` is a plain extern "C" fn that never unwinds
    let rc = unsafe { libc::atexit(flush_on_exit) };
    if rc != 0 {
        warn!(target: "canopy::diagnostics", "atexit registration failed");
    }
}

#[cfg(unix)]
extern "C" fn on_fatal_signal(signal: libc::c_int) {
    CRASH_SIGNALLED.store(true, Ordering::SeqCst);
    // SAFETY: signal(2) is async-signal-safe; restoring SIG_DFL lets the
    // re-delivered signal terminate the process
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
    }
}

#[cfg(unix)]
fn install_signal_handlers() {
    const FATAL: [libc::c_int; 5] = [
        libc::SIGABRT,
        libc::SIGSEGV,
        libc::SIGBUS,
        libc::SIGFPE,
        libc::SIGILL,
    ];
    let handler = on_fatal_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    for signal in FATAL {
        // SAFETY: the handler only touches an atomic and calls signal(2)
        let previous = unsafe { libc::signal(signal, handler) };
        if previous == libc::SIG_ERR {
            warn!(target: "canopy::diagnostics", signal, "Signal handler registration failed");
        }
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}
