//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or validated
    #[error("Failed to load configuration: {0}")]
    Config(#[from] contracts::ContractError),

    /// Forest could not be built or installed
    #[error("Failed to plant forest: {0}")]
    Forest(#[from] canopy::CanopyError),

    /// No crash file at the expected location
    #[error("No crash log at {path}")]
    CrashLogMissing { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn crash_log_missing(path: &Path) -> Self {
        Self::CrashLogMissing {
            path: path.display().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
