//! Forest - the tree registry and fan-out dispatcher

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use contracts::{
    BuildMode, LogArg, LogLevel, Record, SharedError, SourceLocation, Template, Tree,
};

use crate::crash_hooks;
use crate::proxy::TaggedProxy;

/// Thread-safe registry of planted trees.
///
/// Every log call snapshots the tree list under the lock, releases it and
/// then fans out on the calling thread, in planting order. Trees may block,
/// log recursively or plant more trees without deadlocking the registry.
pub struct Forest {
    trees: Mutex<Vec<Arc<dyn Tree>>>,
    has_non_debug: AtomicBool,
    needs_recalc: AtomicBool,
    build_mode: BuildMode,
}

impl Default for Forest {
    fn default() -> Self {
        Self::new(BuildMode::default())
    }
}

impl std::fmt::Debug for Forest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .lock()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        f.debug_struct("Forest")
            .field("build_mode", &self.build_mode)
            .field("trees", &names)
            .finish()
    }
}

impl Forest {
    pub fn new(build_mode: BuildMode) -> Self {
        Self {
            trees: Mutex::new(Vec::new()),
            has_non_debug: AtomicBool::new(false),
            needs_recalc: AtomicBool::new(true),
            build_mode,
        }
    }

    pub fn build_mode(&self) -> BuildMode {
        self.build_mode
    }

    /// Append trees in order. Planting the same tree twice makes it receive
    /// every entry twice.
    pub fn plant<I>(&self, trees: I)
    where
        I: IntoIterator<Item = Arc<dyn Tree>>,
    {
        let mut guard = self.lock();
        let before = guard.len();
        guard.extend(trees);
        self.needs_recalc.store(true, Ordering::Release);
        debug!(
            target: "canopy::diagnostics",
            planted = guard.len() - before,
            total = guard.len(),
            "Trees planted"
        );
    }

    pub fn plant_one(&self, tree: Arc<dyn Tree>) {
        self.plant(std::iter::once(tree));
    }

    /// Remove every tree
    pub fn uproot_all(&self) {
        let mut guard = self.lock();
        guard.clear();
        self.needs_recalc.store(true, Ordering::Release);
    }

    /// Remove every occurrence of `tree`; returns how many were removed
    pub fn uproot(&self, tree: &Arc<dyn Tree>) -> usize {
        let target = Arc::as_ptr(tree) as *const ();
        let mut guard = self.lock();
        let before = guard.len();
        guard.retain(|t| Arc::as_ptr(t) as *const () != target);
        self.needs_recalc.store(true, Ordering::Release);
        before - guard.len()
    }

    pub fn tree_count(&self) -> usize {
        self.lock().len()
    }

    /// Consistent copy of the current tree list
    pub fn forest(&self) -> Vec<Arc<dyn Tree>> {
        self.lock().clone()
    }

    /// Whether at least one planted tree is not debug-only.
    ///
    /// Cached; recomputed under the lock after any plant/uproot.
    pub fn has_non_debug_trees(&self) -> bool {
        if self.needs_recalc.load(Ordering::Acquire) {
            let guard = self.lock();
            let value = guard.iter().any(|t| !t.is_debug_only());
            self.has_non_debug.store(value, Ordering::Release);
            self.needs_recalc.store(false, Ordering::Release);
        }
        self.has_non_debug.load(Ordering::Acquire)
    }

    /// Proxy that pre-binds a tag to every call
    pub fn tag<'a>(&'a self, tag: impl Into<Option<&'a str>>) -> TaggedProxy<'a> {
        TaggedProxy::new(self, tag.into())
    }

    /// Proxy that pre-binds an error to every call
    pub fn error(&self, error: SharedError) -> TaggedProxy<'_> {
        TaggedProxy::new(self, None).error(error)
    }

    #[track_caller]
    pub fn v(&self, message: &str, args: &[LogArg<'_>]) {
        self.emit(LogLevel::Verbose, message, args);
    }

    #[track_caller]
    pub fn d(&self, message: &str, args: &[LogArg<'_>]) {
        self.emit(LogLevel::Debug, message, args);
    }

    #[track_caller]
    pub fn i(&self, message: &str, args: &[LogArg<'_>]) {
        self.emit(LogLevel::Info, message, args);
    }

    #[track_caller]
    pub fn w(&self, message: &str, args: &[LogArg<'_>]) {
        self.emit(LogLevel::Warning, message, args);
    }

    #[track_caller]
    pub fn e(&self, message: &str, args: &[LogArg<'_>]) {
        self.emit(LogLevel::Error, message, args);
    }

    #[track_caller]
    fn emit(&self, level: LogLevel, message: &str, args: &[LogArg<'_>]) {
        self.log(
            level,
            Template::Text(message),
            args,
            None,
            None,
            SourceLocation::caller(),
        );
    }

    /// Dispatch one call to every planted tree that accepts `level`.
    ///
    /// A lazy template is only evaluated if some tree formats the message.
    /// A tree that panics is reported on the diagnostic channel and skipped.
    pub fn log(
        &self,
        level: LogLevel,
        template: Template<'_>,
        args: &[LogArg<'_>],
        tag: Option<&str>,
        error: Option<&SharedError>,
        location: SourceLocation,
    ) {
        crash_hooks::crash_checkpoint();

        if self.build_mode == BuildMode::Release && !self.has_non_debug_trees() {
            return;
        }

        let trees = self.forest();
        if trees.is_empty() {
            return;
        }

        let record = Record::new(level, template, location)
            .with_tag(tag)
            .with_args(args)
            .with_error(error);

        for tree in &trees {
            if !tree.is_loggable(level) {
                continue;
            }
            if let Err(payload) = crash_hooks::contain_tree_panic(|| tree.log(&record)) {
                error!(
                    target: "canopy::diagnostics",
                    tree = tree.name(),
                    panic = panic_message(payload.as_ref()),
                    "Tree panicked while logging"
                );
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn Tree>>> {
        self.trees.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
