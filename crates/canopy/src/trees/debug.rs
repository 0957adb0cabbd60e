//! DebugTree - console output through `tracing`

use std::fmt::Write;

use tracing::{debug, error, info, trace, warn};

use contracts::{resolve_tag, Entry, LogLevel, Record, Tree, TreeState};

/// Tree that writes every entry to the `canopy` tracing target.
///
/// When no tag was given and the thread has no context, the source file
/// stem becomes the tag (`network.rs` -> `network`). Debug-only: in a
/// release-mode forest it does not keep dispatch alive by itself.
pub struct DebugTree {
    state: TreeState,
    name: String,
}

impl Default for DebugTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugTree {
    pub fn new() -> Self {
        Self::named("debug")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            state: TreeState::new(),
            name: name.into(),
        }
    }

    /// `[tag] message | Error: err (file.rs:42)`
    pub fn render(entry: &Entry<'_>) -> String {
        let mut line = String::with_capacity(entry.message.len() + 32);
        if let Some(tag) = entry.tag.filter(|t| !t.is_empty()) {
            line.push('[');
            line.push_str(tag);
            line.push_str("] ");
        }
        line.push_str(entry.message);
        if let Some(err) = entry.error {
            line.push_str(" | Error: ");
            line.push_str(&err.to_string());
        }
        let _ = write!(line, " ({})", entry.location);
        line
    }
}

/// One-shot tag, per-call tag, thread context, then the source file stem
fn effective_tag(explicit: Option<String>, record: &Record<'_>) -> String {
    resolve_tag(explicit, record.tag())
        .unwrap_or_else(|| record.location().auto_tag().to_owned())
}

impl Tree for DebugTree {
    fn state(&self) -> &TreeState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_debug_only(&self) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        let tag = effective_tag(self.state.take_explicit_tag(), record);
        self.receive(&Entry {
            level: record.level(),
            tag: Some(&tag),
            message: record.message(),
            error: record.error(),
            location: record.location(),
        });
    }

    fn receive(&self, entry: &Entry<'_>) {
        let line = Self::render(entry);
        let tag = entry.tag.unwrap_or_default();
        match entry.level {
            LogLevel::Verbose => trace!(target: "canopy", tag, "{line}"),
            LogLevel::Debug => debug!(target: "canopy", tag, "{line}"),
            LogLevel::Info => info!(target: "canopy", tag, "{line}"),
            LogLevel::Warning => warn!(target: "canopy", tag, "{line}"),
            LogLevel::Error => error!(target: "canopy", tag, "{line}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{share_error, CanopyContext, SourceLocation, Template};

    fn location() -> SourceLocation {
        SourceLocation::new("src/net/NetworkClient.rs", 42, 9)
    }

    #[test]
    fn test_render_full_line() {
        let err = share_error(std::io::Error::other("refused"));
        let entry = Entry {
            level: LogLevel::Error,
            tag: Some("Net"),
            message: "connect failed",
            error: Some(&err),
            location: location(),
        };

        assert_eq!(
            DebugTree::render(&entry),
            "[Net] connect failed | Error: refused (NetworkClient.rs:42)"
        );
    }

    #[test]
    fn test_render_without_tag() {
        let entry = Entry {
            level: LogLevel::Info,
            tag: Some(""),
            message: "plain",
            error: None,
            location: location(),
        };

        assert_eq!(DebugTree::render(&entry), "plain (NetworkClient.rs:42)");
    }

    #[test]
    fn test_tag_precedence() {
        CanopyContext::set(None);
        let plain = Record::new(LogLevel::Info, Template::Text("m"), location());
        let tagged =
            Record::new(LogLevel::Info, Template::Text("m"), location()).with_tag(Some("Call"));

        assert_eq!(effective_tag(None, &plain), "NetworkClient");

        CanopyContext::with(Some("Ctx"), || {
            assert_eq!(effective_tag(None, &plain), "Ctx");
            assert_eq!(effective_tag(None, &tagged), "Call");
            assert_eq!(effective_tag(Some("Once".into()), &tagged), "Once");
        });

        assert_eq!(effective_tag(None, &plain), "NetworkClient");
    }

    #[test]
    fn test_auto_tag_from_bare_file_name() {
        CanopyContext::set(None);
        let record = Record::new(
            LogLevel::Debug,
            Template::Text("m"),
            SourceLocation::new("main.rs", 1, 1),
        );
        assert_eq!(effective_tag(None, &record), "main");
    }

    #[test]
    fn test_is_debug_only() {
        let tree = DebugTree::new();
        assert!(tree.is_debug_only());
        assert_eq!(tree.name(), "debug");
        assert_eq!(tree.min_level(), LogLevel::Verbose);
    }

    #[test]
    fn test_log_does_not_panic_and_clears_tag() {
        CanopyContext::set(None);
        let tree = DebugTree::new();
        let args: [contracts::LogArg<'_>; 1] = [&"world"];
        let record =
            Record::new(LogLevel::Warning, Template::Text("hello %s"), location()).with_args(&args);

        tree.tag("Once").log(&record);
        assert_eq!(tree.state().explicit_tag(), None);
    }
}
