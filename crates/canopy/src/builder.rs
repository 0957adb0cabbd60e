//! Config-driven forest construction

use std::sync::Arc;

use tracing::{debug, info, instrument};

use contracts::{BuildMode, CanopyConfig, TreeConfig, TreeType, Tree};

use crate::crash_hooks::install_crash_hooks;
use crate::error::CanopyError;
use crate::forest::Forest;
use crate::trees::{AsyncTree, CrashBufferConfig, CrashBufferTree, DebugTree, RemoteConfig, RemoteTree};

/// Build a forest and plant every configured tree, in order
#[instrument(
    name = "canopy_create_forest",
    skip(config),
    fields(build_mode = %config.build_mode, tree_count = config.trees.len())
)]
pub fn create_forest(config: &CanopyConfig) -> Result<Forest, CanopyError> {
    let forest = Forest::new(config.build_mode);
    let mut trees = Vec::with_capacity(config.trees.len());
    for tree_config in &config.trees {
        trees.push(create_tree(tree_config, config.build_mode)?);
    }
    forest.plant(trees);

    info!(
        target: "canopy::diagnostics",
        trees = forest.tree_count(),
        build_mode = %config.build_mode,
        "Forest planted"
    );
    Ok(forest)
}

/// Create one tree from its configuration
#[instrument(
    name = "canopy_create_tree",
    skip(config, build_mode),
    fields(tree = %config.name, tree_type = %config.tree_type)
)]
pub fn create_tree(config: &TreeConfig, build_mode: BuildMode) -> Result<Arc<dyn Tree>, CanopyError> {
    let creation = |e: contracts::ContractError| CanopyError::tree_creation(&config.name, e.to_string());

    let tree: Arc<dyn Tree> = match config.tree_type {
        TreeType::Debug => Arc::new(DebugTree::named(&config.name)),
        TreeType::CrashBuffer => {
            let crash_config = CrashBufferConfig::from_params(&config.params).map_err(creation)?;
            let install_hooks = crash_config.install_hooks;
            let tree = Arc::new(
                CrashBufferTree::with_config(crash_config)
                    .map_err(creation)?
                    .named(&config.name),
            );
            if install_hooks {
                install_crash_hooks(&tree);
            }
            tree
        }
        TreeType::Remote => {
            let remote_config = RemoteConfig::from_params(&config.params).map_err(creation)?;
            Arc::new(
                RemoteTree::udp(remote_config)
                    .map_err(creation)?
                    .named(&config.name)
                    .with_environment(build_mode),
            )
        }
    };

    if let Some(level) = config.min_level {
        tree.set_min_level(level);
    }

    if config.async_dispatch {
        let wrapped = AsyncTree::new(tree)
            .map_err(|e| CanopyError::tree_creation(&config.name, e.to_string()))?;
        debug!(tree = %config.name, "Wrapped in AsyncTree");
        return Ok(Arc::new(wrapped));
    }

    Ok(tree)
}
