//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{BuildMode, CanopyConfig, TreeType};

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    build_mode: BuildMode,
    tree_count: usize,
    debug_trees: usize,
    crash_buffer_trees: usize,
    remote_trees: usize,
    async_trees: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = match super::load_config(&args.config) {
        Ok(config) => ValidationResult {
            valid: true,
            config_path: args.config.display().to_string(),
            error: None,
            warnings: collect_warnings(&config),
            summary: Some(summarize(&config)),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path: args.config.display().to_string(),
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    };

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn summarize(config: &CanopyConfig) -> ConfigSummary {
    let count = |ty: TreeType| config.trees.iter().filter(|t| t.tree_type == ty).count();
    ConfigSummary {
        version: format!("{:?}", config.version),
        build_mode: config.build_mode,
        tree_count: config.trees.len(),
        debug_trees: count(TreeType::Debug),
        crash_buffer_trees: count(TreeType::CrashBuffer),
        remote_trees: count(TreeType::Remote),
        async_trees: config.trees.iter().filter(|t| t.async_dispatch).count(),
    }
}

/// Non-fatal issues
fn collect_warnings(config: &CanopyConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.trees.is_empty() {
        warnings.push("No trees configured - every log call is dropped".to_string());
    } else if config.build_mode == BuildMode::Release
        && config.trees.iter().all(|t| t.tree_type == TreeType::Debug)
    {
        warnings.push(
            "Release mode with only debug trees - log calls are skipped entirely".to_string(),
        );
    }

    let hooked: Vec<&str> = config
        .trees
        .iter()
        .filter(|t| t.tree_type == TreeType::CrashBuffer)
        .filter(|t| t.params.get("install_hooks").map_or(true, |v| v.trim() != "false"))
        .map(|t| t.name.as_str())
        .collect();
    if hooked.len() > 1 {
        warnings.push(format!(
            "Crash buffers {hooked:?} all install crash hooks - only the last one is flushed on crash"
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Build mode: {}", summary.build_mode);
            println!("  Trees: {}", summary.tree_count);
            println!("    debug: {}", summary.debug_trees);
            println!("    crash_buffer: {}", summary.crash_buffer_trees);
            println!("    remote: {}", summary.remote_trees);
            println!("  Async: {}", summary.async_trees);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TreeConfig;
    use std::collections::HashMap;

    fn tree(name: &str, tree_type: TreeType) -> TreeConfig {
        TreeConfig {
            name: name.into(),
            tree_type,
            min_level: None,
            async_dispatch: false,
            params: HashMap::new(),
        }
    }

    #[test]
    fn test_warnings() {
        let empty = CanopyConfig::default();
        assert_eq!(collect_warnings(&empty).len(), 1);

        let release_debug_only = CanopyConfig {
            build_mode: BuildMode::Release,
            trees: vec![tree("console", TreeType::Debug)],
            ..Default::default()
        };
        assert!(collect_warnings(&release_debug_only)[0].contains("Release mode"));

        let mut quiet = tree("b", TreeType::CrashBuffer);
        quiet.params.insert("install_hooks".into(), "false".into());
        let two_hooked = CanopyConfig {
            trees: vec![
                tree("a", TreeType::CrashBuffer),
                quiet,
                tree("c", TreeType::CrashBuffer),
            ],
            ..Default::default()
        };
        let warnings = collect_warnings(&two_hooked);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains(r#"["a", "c"]"#), "got: {warnings:?}");
    }

    #[test]
    fn test_summary_counts() {
        let mut console = tree("console", TreeType::Debug);
        console.async_dispatch = true;
        let config = CanopyConfig {
            trees: vec![console, tree("crash", TreeType::CrashBuffer)],
            ..Default::default()
        };
        let summary = summarize(&config);
        assert_eq!(summary.tree_count, 2);
        assert_eq!(summary.debug_trees, 1);
        assert_eq!(summary.crash_buffer_trees, 1);
        assert_eq!(summary.remote_trees, 0);
        assert_eq!(summary.async_trees, 1);
    }
}
