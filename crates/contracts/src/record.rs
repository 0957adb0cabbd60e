//! Record / Entry / LogRecord - the shapes a log call takes on its way to a tree
//!
//! - [`Record`] is what the dispatcher hands to [`Tree::log`](crate::Tree::log):
//!   raw template, arguments, per-call tag. Borrowed, lives for one call.
//! - [`Entry`] is what [`Tree::receive`](crate::Tree::receive) consumes: the
//!   resolved tag and the formatted message.
//! - [`LogRecord`] is an owned, serialisable copy of an entry for trees that
//!   buffer or ship entries elsewhere.

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::{format_message, LogArg};
use crate::{LogLevel, SourceLocation};

/// Error value attached to a log call.
///
/// Reference counted so asynchronous trees can carry it to another thread.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Wrap any error into a [`SharedError`]
pub fn share_error<E>(error: E) -> SharedError
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(error)
}

/// Message template, either already available or produced on demand
#[derive(Clone, Copy)]
pub enum Template<'a> {
    Text(&'a str),
    /// Evaluated at most once per dispatch, and only if a tree consumes it
    Lazy(&'a dyn Fn() -> String),
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Template::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Template::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl<'a> From<&'a str> for Template<'a> {
    fn from(s: &'a str) -> Self {
        Template::Text(s)
    }
}

/// One log call as seen by a tree.
///
/// The template and the formatted message are memoised, so fanning out to N
/// trees costs at most one materialisation and one formatting pass.
pub struct Record<'a> {
    level: LogLevel,
    tag: Option<&'a str>,
    template: Template<'a>,
    args: &'a [LogArg<'a>],
    error: Option<&'a SharedError>,
    location: SourceLocation,
    materialized: OnceCell<String>,
    formatted: OnceCell<String>,
}

impl<'a> Record<'a> {
    pub fn new(level: LogLevel, template: Template<'a>, location: SourceLocation) -> Self {
        Self {
            level,
            tag: None,
            template,
            args: &[],
            error: None,
            location,
            materialized: OnceCell::new(),
            formatted: OnceCell::new(),
        }
    }

    /// Per-call tag; an empty string means no tag
    pub fn with_tag(mut self, tag: Option<&'a str>) -> Self {
        self.tag = tag.filter(|t| !t.is_empty());
        self
    }

    pub fn with_args(mut self, args: &'a [LogArg<'a>]) -> Self {
        self.args = args;
        self
    }

    pub fn with_error(mut self, error: Option<&'a SharedError>) -> Self {
        self.error = error;
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn tag(&self) -> Option<&'a str> {
        self.tag
    }

    pub fn args(&self) -> &'a [LogArg<'a>] {
        self.args
    }

    pub fn error(&self) -> Option<&'a SharedError> {
        self.error
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// Raw template, materialising a lazy one on first access
    pub fn template(&self) -> &str {
        match self.template {
            Template::Text(s) => s,
            Template::Lazy(f) => self.materialized.get_or_init(f),
        }
    }

    /// Template rendered with the call's arguments
    pub fn message(&self) -> &str {
        if self.args.is_empty() {
            return self.template();
        }
        self.formatted
            .get_or_init(|| format_message(self.template(), self.args))
    }

    /// Whether the lazy template has been evaluated yet
    pub fn is_materialized(&self) -> bool {
        match self.template {
            Template::Text(_) => true,
            Template::Lazy(_) => self.materialized.get().is_some(),
        }
    }
}

impl fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("level", &self.level)
            .field("tag", &self.tag)
            .field("template", &self.template)
            .field("args", &self.args.len())
            .field("has_error", &self.error.is_some())
            .field("location", &self.location)
            .finish()
    }
}

/// A resolved, formatted log entry delivered to [`Tree::receive`](crate::Tree::receive)
#[derive(Clone, Copy)]
pub struct Entry<'a> {
    pub level: LogLevel,
    pub tag: Option<&'a str>,
    pub message: &'a str,
    pub error: Option<&'a SharedError>,
    pub location: SourceLocation,
}

impl Entry<'_> {
    /// Owned copy stamped with the current time
    pub fn to_record(&self) -> LogRecord {
        LogRecord {
            timestamp: Utc::now(),
            level: self.level,
            tag: self.tag.map(str::to_owned),
            message: self.message.to_owned(),
            error: self.error.map(|e| e.to_string()),
            file: self.location.file_name().to_owned(),
            line: self.location.line,
            function: self.location.function.map(str::to_owned),
        }
    }
}

impl fmt::Debug for Entry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("level", &self.level)
            .field("tag", &self.tag)
            .field("message", &self.message)
            .field("error", &self.error.map(|e| e.to_string()))
            .field("location", &self.location)
            .finish()
    }
}

/// Owned, serialisable log entry.
///
/// Optional fields are always written so that non self-describing formats
/// (bincode) decode back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(default)]
    pub tag: Option<String>,
    pub message: String,
    #[serde(default)]
    pub error: Option<String>,
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub function: Option<String>,
}
