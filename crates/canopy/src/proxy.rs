//! TaggedProxy - level methods with a pre-bound tag and/or error

use contracts::{LogArg, LogLevel, SharedError, SourceLocation, Template};

use crate::forest::Forest;

/// Forwards `v/d/i/w/e` to a [`Forest`] with a tag and error bound up front.
///
/// Holds no tree state, so it can be kept around or discarded after one use.
#[derive(Clone)]
pub struct TaggedProxy<'a> {
    forest: &'a Forest,
    tag: Option<&'a str>,
    error: Option<SharedError>,
}

impl<'a> TaggedProxy<'a> {
    pub(crate) fn new(forest: &'a Forest, tag: Option<&'a str>) -> Self {
        Self {
            forest,
            tag: tag.filter(|t| !t.is_empty()),
            error: None,
        }
    }

    /// Attach an error to every call made through this proxy
    pub fn error(mut self, error: SharedError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn bound_tag(&self) -> Option<&'a str> {
        self.tag
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
        self.forest.log(
            level,
            Template::Text(message),
            args,
            self.tag,
            self.error.as_ref(),
            SourceLocation::caller(),
        );
    }
}

impl std::fmt::Debug for TaggedProxy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggedProxy")
            .field("tag", &self.tag)
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .finish()
    }
}
