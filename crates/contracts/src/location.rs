//! SourceLocation - where a log call was issued

use std::fmt;
use std::path::Path;

/// Call-site information attached to every log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
    /// Module path or function name, when the call site provides one
    pub function: Option<&'static str>,
}

impl SourceLocation {
    pub const fn new(file: &'static str, line: u32, column: u32) -> Self {
        Self {
            file,
            line,
            column,
            function: None,
        }
    }

    pub const fn with_function(mut self, function: &'static str) -> Self {
        self.function = Some(function);
        self
    }

    /// Location of the caller of the `#[track_caller]` function this runs in
    #[track_caller]
    pub fn caller() -> Self {
        std::panic::Location::caller().into()
    }

    /// Last path component of `file`
    pub fn file_name(&self) -> &'static str {
        Path::new(self.file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(self.file)
    }

    /// Tag derived from the file name: everything before the first `.`
    ///
    /// Falls back to `"Canopy"` when the file has no usable name.
    pub fn auto_tag(&self) -> &'static str {
        match self.file_name().split('.').next() {
            Some(stem) if !stem.is_empty() => stem,
            _ => "Canopy",
        }
    }
}

impl From<&'static std::panic::Location<'static>> for SourceLocation {
    fn from(loc: &'static std::panic::Location<'static>) -> Self {
        Self::new(loc.file(), loc.line(), loc.column())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_name(), self.line)
    }
}
