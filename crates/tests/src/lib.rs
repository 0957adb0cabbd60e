//! # Integration Tests
//!
//! Cross-crate tests.
//!
//! Covers:
//! - Contract behavior shared by every crate
//! - Config file -> forest -> trees, end to end
//! - The process-wide forest and crash hooks (one test each per binary)

/// Tree recording every entry it receives, for assertions
#[cfg(test)]
mod support {
    use std::sync::Mutex;
    use std::thread::ThreadId;

    use contracts::{CanopyContext, Entry, LogLevel, Tree, TreeState};

    #[derive(Debug, Clone, PartialEq)]
    pub struct Seen {
        pub level: LogLevel,
        pub tag: Option<String>,
        pub message: String,
        pub context: Option<String>,
        pub thread: ThreadId,
    }

    #[derive(Default)]
    pub struct RecordingTree {
        state: TreeState,
        pub seen: Mutex<Vec<Seen>>,
    }

    impl RecordingTree {
        pub fn messages(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|s| s.message.clone())
                .collect()
        }
    }

    impl Tree for RecordingTree {
        fn state(&self) -> &TreeState {
            &self.state
        }

        fn receive(&self, entry: &Entry<'_>) {
            self.seen.lock().unwrap().push(Seen {
                level: entry.level,
                tag: entry.tag.map(str::to_owned),
                message: entry.message.to_owned(),
                context: CanopyContext::current(),
                thread: std::thread::current().id(),
            });
        }
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{format_message, LogLevel};

    #[test]
    fn test_level_priorities_are_ordered() {
        let levels = [
            LogLevel::Verbose,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
        ];
        assert!(levels.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_formatter_contract() {
        assert_eq!(
            format_message("User %s has %d items", &[&"Alice", &5]),
            "User Alice has 5 items"
        );
        // arity mismatch is returned verbatim
        assert_eq!(format_message("%s and %s", &[&"one"]), "%s and %s");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use canopy::{
        AsyncTree, CanopyContext, Forest, LogBatch, LogLevel, LogTransport, NetworkFormat,
        RemoteConfig, RemoteTree, Tree,
    };
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{BuildMode, ContractError};

    use crate::support::RecordingTree;

    #[derive(Clone, Default)]
    struct CollectingTransport(Arc<Mutex<Vec<Vec<u8>>>>);

    impl LogTransport for CollectingTransport {
        fn send(&self, payload: &[u8]) -> Result<(), ContractError> {
            self.0.lock().unwrap().push(payload.to_vec());
            Ok(())
        }
    }

    /// End-to-end: config text -> ConfigLoader -> create_forest -> log calls
    #[test]
    fn test_config_to_forest() {
        let config = ConfigLoader::load_from_str(
            r#"
build_mode = "release"

[[trees]]
name = "console"
tree_type = "debug"
min_level = "warning"
async = true
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let forest = canopy::create_forest(&config).unwrap();
        assert_eq!(forest.tree_count(), 1);
        assert_eq!(forest.forest()[0].name(), "async(console)");
        // release mode with only a debug tree: dispatch is skipped
        assert!(!forest.has_non_debug_trees());

        let recorder = Arc::new(RecordingTree::default());
        forest.plant_one(recorder.clone());
        assert!(forest.has_non_debug_trees());

        canopy::i!(forest: &forest, "planted %d trees", forest.tree_count());
        assert_eq!(recorder.messages(), vec!["planted 2 trees"]);
    }

    /// Many threads, each with its own context, through one async tree
    #[test]
    fn test_async_tree_preserves_order_and_context() {
        let recorder = Arc::new(RecordingTree::default());
        let async_tree = Arc::new(AsyncTree::new(recorder.clone()).unwrap());
        let forest = Arc::new(Forest::new(BuildMode::Debug));
        forest.plant_one(async_tree.clone());

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let forest = forest.clone();
                thread::spawn(move || {
                    let context = format!("worker-{worker}");
                    CanopyContext::with(Some(context.as_str()), || {
                        for n in 0..50 {
                            canopy::d!(forest: &forest, "%d", n);
                        }
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(async_tree.flush());

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 200);
        let caller = thread::current().id();
        for worker in 0..4 {
            let context = format!("worker-{worker}");
            let messages: Vec<&str> = seen
                .iter()
                .filter(|s| s.context.as_deref() == Some(context.as_str()))
                .map(|s| s.message.as_str())
                .collect();
            let expected: Vec<String> = (0..50).map(|n| n.to_string()).collect();
            assert_eq!(messages, expected);
        }
        assert!(seen.iter().all(|s| s.thread != caller));
        // no explicit tag: the context captured on the caller becomes the tag
        assert!(seen.iter().all(|s| s.tag == s.context));
    }

    /// Remote batching behind an async tree, decoded on the collector side
    #[tokio::test]
    async fn test_remote_batches_reach_collector() {
        let transport = CollectingTransport::default();
        let remote = Arc::new(
            RemoteTree::new(
                RemoteConfig {
                    batch_size: 2,
                    format: NetworkFormat::Json,
                    ..Default::default()
                },
                Box::new(transport.clone()),
            )
            .unwrap()
            .with_environment(BuildMode::Release),
        );
        let async_tree = Arc::new(AsyncTree::new(remote.clone()).unwrap());

        let forest = Forest::new(BuildMode::Release);
        forest.plant_one(async_tree.clone());

        canopy::d!(forest: &forest, "below the remote threshold");
        canopy::i!(forest: &forest, tag: "Auth", "login %s", "alice");
        canopy::w!(forest: &forest, "disk at %d%%", 91);
        canopy::e!(forest: &forest, "lost %d events", 3);
        assert!(async_tree.flush_async().await);

        let sent = transport.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let batch = LogBatch::decode(&sent[0], NetworkFormat::Json).unwrap();
        assert_eq!(batch.environment, "release");
        let levels: Vec<LogLevel> = batch.entries.iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![LogLevel::Info, LogLevel::Warning]);
        assert_eq!(batch.entries[0].tag.as_deref(), Some("Auth"));
        assert_eq!(batch.entries[0].message, "login alice");
        assert_eq!(batch.entries[1].message, "disk at 91%");
        // the error waits for the next full batch
        assert_eq!(remote.pending(), 1);
    }
}

#[cfg(test)]
mod global_tests {
    use std::fs;
    use std::sync::Arc;

    use canopy::CanopyError;
    use config_loader::{ConfigFormat, ConfigLoader};

    use crate::support::RecordingTree;

    // The only test in this binary that touches the process-wide forest and
    // the crash hooks
    #[test]
    fn test_global_forest_with_crash_buffer() {
        let dir = tempfile::TempDir::new().unwrap();
        let crash_path = dir.path().join("crash").join("last.txt");
        let config = ConfigLoader::load_from_str(
            &format!(
                r#"{{
                    "build_mode": "debug",
                    "trees": [{{
                        "name": "crash",
                        "tree_type": "crash_buffer",
                        "params": {{ "capacity": 3, "path": {:?} }}
                    }}]
                }}"#,
                crash_path.display().to_string()
            ),
            ConfigFormat::Json,
        )
        .unwrap();

        let forest = canopy::init(&config).unwrap();
        assert!(std::ptr::eq(forest, canopy::global()));
        assert!(matches!(
            canopy::init(&config),
            Err(CanopyError::AlreadyInitialized)
        ));

        let recorder = Arc::new(RecordingTree::default());
        canopy::plant_one(recorder.clone());

        for n in 1..=5 {
            canopy::i!(tag: "Boot", "step %d", n);
        }
        canopy::tag("Net").w("offline", &[]);
        assert_eq!(recorder.messages().len(), 6);

        let crash = canopy::active_crash_buffer().unwrap();
        assert_eq!(crash.len(), 3);
        crash.try_flush().unwrap();
        assert_eq!(
            fs::read_to_string(&crash_path).unwrap(),
            "[info] Boot: step 4\n[info] Boot: step 5\n[warning] Net: offline"
        );

        canopy::uproot_all();
        canopy::e!("after uproot");
        assert_eq!(recorder.messages().len(), 6);
        canopy::clear_crash_hooks();
    }
}
