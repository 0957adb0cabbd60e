//! CrashBufferTree - bounded in-memory history persisted on crash

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use ringbuf::{traits::*, HeapRb};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use contracts::{ContractError, Entry, Tree, TreeState};

pub use contracts::MAX_CRASH_BUFFER_CAPACITY;

/// Capacity used when none is configured
pub const DEFAULT_CRASH_BUFFER_CAPACITY: usize = 100;

/// File name of the persisted buffer
pub const CRASH_FILE_NAME: &str = "canopy_crash_buffer.txt";

/// Default location of the persisted buffer
pub fn default_crash_path() -> PathBuf {
    std::env::temp_dir().join(CRASH_FILE_NAME)
}

/// Configuration for CrashBufferTree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashBufferConfig {
    /// Lines kept in memory
    pub capacity: usize,
    /// Where `flush` writes the buffer
    pub path: PathBuf,
    /// Register panic/exit/signal hooks when built from config
    pub install_hooks: bool,
}

impl Default for CrashBufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CRASH_BUFFER_CAPACITY,
            path: default_crash_path(),
            install_hooks: true,
        }
    }
}

impl CrashBufferConfig {
    /// Create config from params map (`capacity`, `path`, `install_hooks`)
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let mut config = Self::default();

        if let Some(raw) = params.get("capacity") {
            config.capacity = raw.trim().parse().map_err(|_| {
                ContractError::config_validation(
                    "params.capacity",
                    format!("'{raw}' is not a positive integer"),
                )
            })?;
        }
        if let Some(path) = params.get("path") {
            config.path = PathBuf::from(path);
        }
        if let Some(raw) = params.get("install_hooks") {
            config.install_hooks = raw.trim().parse().map_err(|_| {
                ContractError::config_validation(
                    "params.install_hooks",
                    format!("'{raw}' is not a boolean"),
                )
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// `0 < capacity <= MAX_CRASH_BUFFER_CAPACITY`
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.capacity == 0 || self.capacity > MAX_CRASH_BUFFER_CAPACITY {
            return Err(ContractError::config_validation(
                "params.capacity",
                format!(
                    "must be between 1 and {MAX_CRASH_BUFFER_CAPACITY}, got {}",
                    self.capacity
                ),
            ));
        }
        Ok(())
    }
}

/// Tree keeping the last `capacity` formatted lines.
///
/// Lines look like `[level] tag: message`. When full, the oldest line is
/// overwritten. [`CrashBufferTree::flush`] persists the buffer; see
/// [`install_crash_hooks`](crate::install_crash_hooks) for running it on
/// panic, exit and fatal signals.
pub struct CrashBufferTree {
    state: TreeState,
    name: String,
    path: PathBuf,
    buffer: Mutex<HeapRb<String>>,
}

impl std::fmt::Debug for CrashBufferTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashBufferTree")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("path", &self.path)
            .finish()
    }
}

impl CrashBufferTree {
    /// Buffer of `capacity` lines flushed to the default path
    pub fn new(capacity: usize) -> Result<Self, ContractError> {
        Self::with_config(CrashBufferConfig {
            capacity,
            ..Default::default()
        })
    }

    pub fn with_config(config: CrashBufferConfig) -> Result<Self, ContractError> {
        config.validate()?;
        Ok(Self {
            state: TreeState::new(),
            name: "crash_buffer".to_string(),
            path: config.path,
            buffer: Mutex::new(HeapRb::new(config.capacity)),
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity().get()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.lock().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Buffered lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    /// Buffered lines joined with `\n`
    pub fn recent_logs(&self) -> String {
        join_lines(&self.lock())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// `[level] tag: message`, with an empty tag when absent
    pub fn format_line(entry: &Entry<'_>) -> String {
        format!(
            "[{}] {}: {}",
            entry.level,
            entry.tag.unwrap_or_default(),
            entry.message
        )
    }

    /// Persist the buffer; failures are reported, never returned
    pub fn flush(&self) {
        if let Err(e) = self.try_flush() {
            warn!(
                target: "canopy::diagnostics",
                tree = %self.name,
                path = %self.path.display(),
                error = %e,
                "Crash buffer flush failed"
            );
        }
    }

    /// Persist the buffer, replacing the file atomically
    #[instrument(name = "crash_buffer_flush", skip(self), fields(tree = %self.name))]
    pub fn try_flush(&self) -> Result<(), ContractError> {
        let contents = self.recent_logs();
        write_atomic(&self.path, contents.as_bytes())
            .map_err(|e| ContractError::tree_write(&self.name, e.to_string()))?;
        debug!(path = %self.path.display(), bytes = contents.len(), "Crash buffer flushed");
        Ok(())
    }

    /// Flush unless the buffer is locked by this or another thread.
    ///
    /// Used from panic and exit hooks, where the lock may already be held
    /// further up the stack.
    pub(crate) fn flush_if_unlocked(&self) {
        let contents = match self.buffer.try_lock() {
            Ok(guard) => join_lines(&guard),
            Err(TryLockError::Poisoned(poisoned)) => join_lines(&poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => return,
        };
        if let Err(e) = write_atomic(&self.path, contents.as_bytes()) {
            warn!(
                target: "canopy::diagnostics",
                tree = %self.name,
                error = %e,
                "Crash buffer flush from hook failed"
            );
        }
    }

    fn push(&self, line: String) {
        self.lock().push_overwrite(line);
    }

    fn lock(&self) -> MutexGuard<'_, HeapRb<String>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Tree for CrashBufferTree {
    fn state(&self) -> &TreeState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&self, entry: &Entry<'_>) {
        self.push(Self::format_line(entry));
    }
}

fn join_lines(buffer: &HeapRb<String>) -> String {
    buffer
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write to a uniquely named temp file next to `path`, then rename over it.
///
/// Concurrent flushes each get their own temp file; the last rename wins.
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
