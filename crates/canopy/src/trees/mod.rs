//! Tree implementations
//!
//! Contains DebugTree, AsyncTree, CrashBufferTree and RemoteTree.

mod async_tree;
mod crash_buffer;
mod debug;
mod remote;

pub use self::async_tree::AsyncTree;
pub use self::crash_buffer::{
    default_crash_path, CrashBufferConfig, CrashBufferTree, CRASH_FILE_NAME,
    DEFAULT_CRASH_BUFFER_CAPACITY, MAX_CRASH_BUFFER_CAPACITY,
};
pub use self::debug::DebugTree;
pub use self::remote::{
    LogBatch, LogTransport, NetworkFormat, RemoteConfig, RemoteTree, UdpTransport,
};
