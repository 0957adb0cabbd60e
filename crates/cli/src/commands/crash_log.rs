//! `crash-log` command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use canopy::{default_crash_path, CrashBufferConfig};
use contracts::{CanopyConfig, TreeType};

use crate::cli::CrashLogArgs;
use crate::error::CliError;

/// Execute the `crash-log` command
pub fn run_crash_log(args: &CrashLogArgs) -> Result<()> {
    let path = match (&args.path, &args.config) {
        (Some(path), _) => path.clone(),
        (None, Some(config)) => {
            let config = super::load_config(config)
                .with_context(|| format!("Failed to load config from {}", config.display()))?;
            configured_crash_path(&config)?.unwrap_or_else(default_crash_path)
        }
        (None, None) => default_crash_path(),
    };
    info!(path = %path.display(), "Reading crash log");

    let lines = read_crash_log(&path)?;
    if lines.is_empty() {
        println!("(crash log at {} is empty)", path.display());
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Path of the first crash buffer tree in `config`
fn configured_crash_path(config: &CanopyConfig) -> Result<Option<PathBuf>, CliError> {
    let Some(tree) = config
        .trees
        .iter()
        .find(|t| t.tree_type == TreeType::CrashBuffer)
    else {
        return Ok(None);
    };
    Ok(Some(CrashBufferConfig::from_params(&tree.params)?.path))
}

fn read_crash_log(path: &Path) -> Result<Vec<String>, CliError> {
    if !path.exists() {
        return Err(CliError::crash_log_missing(path));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_owned).collect())
}
