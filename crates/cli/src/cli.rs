//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Canopy - validate forest configurations and exercise them with sample traffic
#[derive(Parser, Debug)]
#[command(
    name = "canopy",
    author,
    version,
    about = "Pluggable logging facade: config validation, smoke runs, crash logs",
    long_about = "Loads a canopy forest configuration (TOML or JSON), reports on it, \n\
                  plants it and drives sample traffic through every tree, and prints \n\
                  the buffer persisted by a crash buffer tree."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CANOPY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "CANOPY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a configuration file
    Validate(ValidateArgs),

    /// Display the trees a configuration would plant
    Info(InfoArgs),

    /// Plant the configured forest and emit sample traffic
    Run(RunArgs),

    /// Print the persisted crash buffer
    CrashLog(CrashLogArgs),
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "canopy.toml", env = "CANOPY_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "canopy.toml", env = "CANOPY_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "canopy.toml", env = "CANOPY_CONFIG")]
    pub config: PathBuf,

    /// Concurrent tasks emitting traffic
    #[arg(long, default_value = "4", env = "CANOPY_THREADS")]
    pub threads: usize,

    /// Messages emitted by each task
    #[arg(long, default_value = "100", env = "CANOPY_MESSAGES")]
    pub messages: usize,
}

#[derive(Parser, Debug)]
pub struct CrashLogArgs {
    /// Crash file to print (defaults to the crash buffer path of --config,
    /// then to the temp-dir default)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Configuration whose crash buffer tree names the file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
