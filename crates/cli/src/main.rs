//! # Canopy CLI
//!
//! Entry point.
//!
//! Provides:
//! - Configuration validation and inspection
//! - Smoke runs that plant a forest and drive traffic through it
//! - Access to the persisted crash buffer

mod cli;
mod commands;
mod error;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_crash_log, run_info, run_traffic, run_validate};
use contracts::LogLevel;
use observability::ObservabilityConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Canopy CLI starting");

    let result = match &cli.command {
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
        Commands::Run(args) => run_traffic(args).await,
        Commands::CrashLog(args) => run_crash_log(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.quiet {
        LogLevel::Warning
    } else {
        match cli.verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Verbose,
        }
    };

    observability::init_with_config(
        ObservabilityConfig {
            log_format: cli.log_format.into(),
            ..Default::default()
        }
        .with_level(level),
    )
}
