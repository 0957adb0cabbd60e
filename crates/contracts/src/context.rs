//! Ambient per-thread tag
//!
//! Each OS thread carries one optional context string. Trees fall back to it
//! when neither a one-shot tag nor a per-call tag was supplied. Scopes nest
//! LIFO through save/restore; every call frame keeps its own previous value.

use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static CURRENT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Thread-local context store
pub struct CanopyContext;

impl CanopyContext {
    /// Context visible to the calling thread
    pub fn current() -> Option<String> {
        CURRENT
            .try_with(|c| c.borrow().clone())
            .ok()
            .flatten()
    }

    /// Replace the calling thread's context, returning the previous value
    pub fn set(tag: Option<String>) -> Option<String> {
        CURRENT
            .try_with(|c| std::mem::replace(&mut *c.borrow_mut(), tag))
            .ok()
            .flatten()
    }

    /// Run `f` with the context set to `tag`.
    ///
    /// The previous value is restored on every exit path, including when `f`
    /// returns an `Err` or panics.
    pub fn with<T>(tag: Option<&str>, f: impl FnOnce() -> T) -> T {
        let _guard = Self::enter(tag);
        f()
    }

    /// Set the context until the returned guard is dropped.
    ///
    /// Guards must be dropped in reverse order of creation.
    pub fn enter(tag: Option<&str>) -> ContextGuard {
        let previous = Self::set(tag.map(str::to_owned));
        ContextGuard {
            previous,
            _not_send: PhantomData,
        }
    }
}

/// Restores the previous context on drop
#[must_use = "the context is restored as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<String>,
    // Thread-local state: the guard must be dropped on the thread that made it
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CanopyContext::set(self.previous.take());
    }
}
