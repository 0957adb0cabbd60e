//! Tree trait - the sink interface every log consumer implements
//!
//! A tree filters by level, optionally carries a one-shot tag override, and
//! receives formatted entries. The dispatcher only ever talks to trees
//! through this trait.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::{CanopyContext, Entry, LogLevel, Record};

/// Mutable per-tree settings shared by every [`Tree`] implementation.
///
/// The one-shot tag sits behind its own mutex, so concurrent `set_tag` /
/// `log` calls are memory-safe. Pairing a `set_tag` with "the next log" is
/// still only meaningful when a single thread drives the tree; shared trees
/// should receive tags per call through the dispatcher instead.
#[derive(Debug)]
pub struct TreeState {
    min_level: AtomicU8,
    explicit_tag: Mutex<Option<String>>,
}

impl Default for TreeState {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeState {
    pub fn new() -> Self {
        Self::with_min_level(LogLevel::Verbose)
    }

    pub fn with_min_level(level: LogLevel) -> Self {
        Self {
            min_level: AtomicU8::new(level.priority()),
            explicit_tag: Mutex::new(None),
        }
    }

    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_priority(self.min_level.load(Ordering::Relaxed)).unwrap_or_default()
    }

    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level.priority(), Ordering::Relaxed);
    }

    /// Store a one-shot tag; `Some("")` is treated as `None`
    pub fn set_explicit_tag(&self, tag: Option<&str>) {
        let tag = tag.filter(|t| !t.is_empty()).map(str::to_owned);
        *self.lock_tag() = tag;
    }

    /// Current one-shot tag without consuming it
    pub fn explicit_tag(&self) -> Option<String> {
        self.lock_tag().clone()
    }

    /// Consume the one-shot tag
    pub fn take_explicit_tag(&self) -> Option<String> {
        self.lock_tag().take()
    }

    fn lock_tag(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.explicit_tag
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tag precedence: one-shot tag, then per-call tag, then the thread's context
pub fn resolve_tag(explicit: Option<String>, call_tag: Option<&str>) -> Option<String> {
    explicit
        .or_else(|| call_tag.filter(|t| !t.is_empty()).map(str::to_owned))
        .or_else(CanopyContext::current)
}

/// A pluggable log consumer.
///
/// Implementors provide [`Tree::state`] and usually override
/// [`Tree::receive`]. Trees that need the raw template and arguments (for
/// example to defer formatting to another thread) override [`Tree::log`]
/// instead.
pub trait Tree: Send + Sync {
    /// Shared mutable settings (threshold, one-shot tag)
    fn state(&self) -> &TreeState;

    /// Name used in diagnostics
    fn name(&self) -> &str {
        "tree"
    }

    fn min_level(&self) -> LogLevel {
        self.state().min_level()
    }

    fn set_min_level(&self, level: LogLevel) {
        self.state().set_min_level(level);
    }

    fn is_loggable(&self, level: LogLevel) -> bool {
        level >= self.min_level()
    }

    /// Debug-only trees do not keep dispatch alive in release builds
    fn is_debug_only(&self) -> bool {
        false
    }

    /// Set the one-shot tag consumed by the next [`Tree::log`] call
    fn set_tag(&self, tag: Option<&str>) {
        self.state().set_explicit_tag(tag);
    }

    /// Chaining form of [`Tree::set_tag`]
    fn tag<'t>(&self, tag: impl Into<Option<&'t str>>) -> &Self
    where
        Self: Sized,
    {
        self.set_tag(tag.into());
        self
    }

    /// Resolve the tag, format the message and hand the entry to
    /// [`Tree::receive`]. Consumes the one-shot tag.
    fn log(&self, record: &Record<'_>) {
        let tag = resolve_tag(self.state().take_explicit_tag(), record.tag());
        self.receive(&Entry {
            level: record.level(),
            tag: tag.as_deref(),
            message: record.message(),
            error: record.error(),
            location: record.location(),
        });
    }

    /// Final consumption of a formatted entry
    fn receive(&self, _entry: &Entry<'_>) {}
}
