//! # Canopy
//!
//! Pluggable logging facade.
//!
//! Responsible for:
//! - Registering trees (sinks) in a thread-safe [`Forest`]
//! - Fan-out of every log call with level filtering and tag resolution
//! - Built-in trees: console, async decorator, crash buffer, remote batching
//!
//! ```ignore
//! use std::sync::Arc;
//! use canopy::{CrashBufferTree, DebugTree};
//!
//! canopy::plant_one(Arc::new(DebugTree::new()));
//! let crash = Arc::new(CrashBufferTree::new(200)?);
//! canopy::install_crash_hooks(&crash);
//! canopy::plant_one(crash);
//!
//! canopy::i!("User %s logged in", "alice");
//! canopy::tag("Net").w("retrying", &[]);
//! ```

pub mod builder;
pub mod crash_hooks;
pub mod error;
pub mod forest;
pub mod global;
mod macros;
pub mod metrics;
pub mod proxy;
pub mod trees;

pub use builder::{create_forest, create_tree};
pub use contracts::{
    format_message, share_error, BuildMode, CanopyConfig, CanopyContext, ContextGuard, Entry,
    LogArg, LogLevel, LogRecord, Record, SharedError, SourceLocation, Template, Tree, TreeState,
};
pub use crash_hooks::{
    active_crash_buffer, clear_crash_hooks, crash_checkpoint, crash_flag_raised,
    install_crash_hooks, raise_crash_flag,
};
pub use error::CanopyError;
pub use forest::Forest;
pub use global::{error, global, init, install, plant, plant_one, tag, uproot_all};
pub use metrics::{MetricsSnapshot, TreeMetrics};
pub use proxy::TaggedProxy;
pub use trees::{
    default_crash_path, AsyncTree, CrashBufferConfig, CrashBufferTree, DebugTree, LogBatch,
    LogTransport, NetworkFormat, RemoteConfig, RemoteTree, UdpTransport, CRASH_FILE_NAME,
    DEFAULT_CRASH_BUFFER_CAPACITY, MAX_CRASH_BUFFER_CAPACITY,
};
