//! AsyncTree - runs a wrapped tree on a dedicated worker thread

use std::sync::{mpsc as std_mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, instrument, warn};

use contracts::{
    CanopyContext, LogLevel, Record, SharedError, SourceLocation, Template, Tree, TreeState,
};

use crate::crash_hooks::contain_tree_panic;
use crate::forest::panic_message;
use crate::metrics::TreeMetrics;

/// Everything captured on the calling thread for one deferred log call
struct PendingLog {
    level: LogLevel,
    tag: Option<String>,
    context: Option<String>,
    message: String,
    error: Option<SharedError>,
    location: SourceLocation,
}

enum Job {
    Log(PendingLog),
    /// Fired once every job queued before it has been delivered
    Barrier(Box<dyn FnOnce() + Send>),
}

/// Decorator that moves a tree's work off the calling thread.
///
/// On the caller: the context, the one-shot (or per-call) tag and the
/// formatted message are captured, then the job is queued. On the worker:
/// the captured context is installed, the inner tree logs, and the worker's
/// own context is restored. Jobs from one `AsyncTree` are delivered FIFO.
///
/// The queue is unbounded; a slow inner tree makes it grow without limit.
pub struct AsyncTree {
    state: TreeState,
    name: String,
    inner: Arc<dyn Tree>,
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<TreeMetrics>,
}

impl AsyncTree {
    /// Wrap `inner` and start its worker thread
    #[instrument(name = "async_tree_new", skip(inner), fields(inner = inner.name()))]
    pub fn new(inner: Arc<dyn Tree>) -> std::io::Result<Self> {
        let name = format!("async({})", inner.name());
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(TreeMetrics::new());

        let worker_inner = Arc::clone(&inner);
        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let worker = thread::Builder::new()
            .name("canopy-async".to_string())
            .spawn(move || run_worker(rx, worker_inner, worker_metrics, worker_name))?;

        Ok(Self {
            state: TreeState::new(),
            name,
            inner,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            metrics,
        })
    }

    pub fn inner(&self) -> &Arc<dyn Tree> {
        &self.inner
    }

    pub fn metrics(&self) -> &Arc<TreeMetrics> {
        &self.metrics
    }

    /// Block until every entry queued before this call has been delivered.
    ///
    /// Returns `false` if the worker is gone. Must not be called from the
    /// inner tree itself.
    pub fn flush(&self) -> bool {
        let (done_tx, done_rx) = std_mpsc::sync_channel(1);
        if !self.send_barrier(move || {
            let _ = done_tx.send(());
        }) {
            return false;
        }
        done_rx.recv().is_ok()
    }

    /// [`AsyncTree::flush`] with an upper bound on the wait
    pub fn flush_timeout(&self, timeout: Duration) -> bool {
        let (done_tx, done_rx) = std_mpsc::sync_channel(1);
        if !self.send_barrier(move || {
            let _ = done_tx.send(());
        }) {
            return false;
        }
        done_rx.recv_timeout(timeout).is_ok()
    }

    /// Async form of [`AsyncTree::flush`], for callers inside a runtime
    pub async fn flush_async(&self) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if !self.send_barrier(move || {
            let _ = done_tx.send(());
        }) {
            return false;
        }
        done_rx.await.is_ok()
    }

    /// Close the queue, drain what is left and join the worker
    #[instrument(name = "async_tree_shutdown", skip(self), fields(tree = %self.name))]
    pub fn shutdown(&self) {
        drop(self.lock_tx().take());

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            // Joining from the worker itself would never return
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!(target: "canopy::diagnostics", tree = %self.name, "Async worker panicked");
            }
        }
        debug!(target: "canopy::diagnostics", tree = %self.name, "AsyncTree shutdown complete");
    }

    fn enqueue(&self, pending: PendingLog) {
        let guard = self.lock_tx();
        let Some(tx) = guard.as_ref() else {
            self.metrics.add_dropped(1);
            return;
        };
        self.metrics.inc_pending();
        if tx.send(Job::Log(pending)).is_err() {
            self.metrics.dec_pending();
            self.metrics.add_dropped(1);
            warn!(target: "canopy::diagnostics", tree = %self.name, "Async worker closed, entry dropped");
        }
    }

    fn send_barrier(&self, done: impl FnOnce() + Send + 'static) -> bool {
        self.lock_tx()
            .as_ref()
            .is_some_and(|tx| tx.send(Job::Barrier(Box::new(done))).is_ok())
    }

    fn lock_tx(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Job>>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AsyncTree {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Tree for AsyncTree {
    fn state(&self) -> &TreeState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn min_level(&self) -> LogLevel {
        self.inner.min_level()
    }

    fn set_min_level(&self, level: LogLevel) {
        self.inner.set_min_level(level);
    }

    fn is_loggable(&self, level: LogLevel) -> bool {
        self.inner.is_loggable(level)
    }

    fn is_debug_only(&self) -> bool {
        self.inner.is_debug_only()
    }

    fn log(&self, record: &Record<'_>) {
        let tag = self
            .state
            .take_explicit_tag()
            .or_else(|| record.tag().map(str::to_owned));

        self.enqueue(PendingLog {
            level: record.level(),
            tag,
            context: CanopyContext::current(),
            message: record.message().to_owned(),
            error: record.error().cloned(),
            location: record.location(),
        });
    }
}

fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Job>,
    inner: Arc<dyn Tree>,
    metrics: Arc<TreeMetrics>,
    name: String,
) {
    debug!(target: "canopy::diagnostics", tree = %name, "Async worker started");

    while let Some(job) = rx.blocking_recv() {
        match job {
            Job::Log(pending) => deliver(inner.as_ref(), pending, &metrics, &name),
            Job::Barrier(done) => done(),
        }
    }

    debug!(target: "canopy::diagnostics", tree = %name, "Async worker stopped");
}

fn deliver(inner: &dyn Tree, pending: PendingLog, metrics: &TreeMetrics, name: &str) {
    let _context = CanopyContext::enter(pending.context.as_deref());
    let record = Record::new(
        pending.level,
        Template::Text(&pending.message),
        pending.location,
    )
    .with_tag(pending.tag.as_deref())
    .with_error(pending.error.as_ref());

    metrics.dec_pending();
    match contain_tree_panic(|| inner.log(&record)) {
        Ok(()) => metrics.inc_delivered(),
        Err(payload) => {
            metrics.inc_failed();
            error!(
                target: "canopy::diagnostics",
                tree = %name,
                panic = panic_message(payload.as_ref()),
                "Inner tree panicked on async worker"
            );
        }
    }
}
