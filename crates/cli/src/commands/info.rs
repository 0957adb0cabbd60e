//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{BuildMode, CanopyConfig, LogLevel, TreeConfig, TreeType};

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    build_mode: BuildMode,
    /// Whether log calls reach the trees at all under this build mode
    dispatch_enabled: bool,
    trees: Vec<TreeInfo>,
}

#[derive(Serialize)]
struct TreeInfo {
    name: String,
    tree_type: TreeType,
    min_level: LogLevel,
    #[serde(rename = "async")]
    async_dispatch: bool,
    debug_only: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = super::load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let info = build_config_info(&config);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{json}");
    } else {
        print_config_info(&info);
    }

    Ok(())
}

/// Level a tree filters at once planted
fn effective_min_level(tree: &TreeConfig) -> LogLevel {
    tree.min_level.unwrap_or(match tree.tree_type {
        TreeType::Remote => LogLevel::Info,
        TreeType::Debug | TreeType::CrashBuffer => LogLevel::Verbose,
    })
}

fn build_config_info(config: &CanopyConfig) -> ConfigInfo {
    let trees: Vec<TreeInfo> = config
        .trees
        .iter()
        .map(|t| TreeInfo {
            name: t.name.clone(),
            tree_type: t.tree_type,
            min_level: effective_min_level(t),
            async_dispatch: t.async_dispatch,
            debug_only: t.tree_type == TreeType::Debug,
            params: t.params.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", config.version),
        build_mode: config.build_mode,
        dispatch_enabled: config.build_mode == BuildMode::Debug
            || trees.iter().any(|t| !t.debug_only),
        trees,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                   Canopy Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Forest");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Build mode: {}", info.build_mode);
    println!(
        "   └─ Dispatch: {}",
        if info.dispatch_enabled { "enabled" } else { "skipped (debug trees only)" }
    );

    println!("\n🌲 Trees ({})", info.trees.len());
    for (i, tree) in info.trees.iter().enumerate() {
        let is_last = i == info.trees.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} ({}, >= {}{})",
            prefix,
            tree.name,
            tree.tree_type,
            tree.min_level,
            if tree.async_dispatch { ", async" } else { "" }
        );
        for (j, (key, value)) in tree.params.iter().enumerate() {
            let param_prefix = if j == tree.params.len() - 1 { "└─" } else { "├─" };
            println!("   {}  {} {} = {}", child_prefix, param_prefix, key, value);
        }
    }

    println!();
}
