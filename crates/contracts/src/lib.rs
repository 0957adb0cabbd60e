//! # Contracts
//!
//! Frozen interface contracts shared by every Canopy crate: levels, log
//! records, the [`Tree`] trait, the message formatter, the thread-local
//! context store and the configuration types.
//! Business crates depend on this crate only; reverse dependencies are prohibited.

mod config;
mod context;
mod error;
mod format;
mod level;
mod location;
mod record;
mod tree;

pub use config::*;
pub use context::{CanopyContext, ContextGuard};
pub use error::*;
pub use format::{count_placeholders, format_message, LogArg};
pub use level::LogLevel;
pub use location::SourceLocation;
pub use record::*;
pub use tree::{resolve_tag, Tree, TreeState};
