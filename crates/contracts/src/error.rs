//! Layered error definitions
//!
//! Categorized by source: config / tree / io

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Tree Errors =====
    /// Tree write error
    #[error("tree '{tree_name}' write error: {message}")]
    TreeWrite { tree_name: String, message: String },

    /// Tree connection error
    #[error("tree '{tree_name}' connection error: {message}")]
    TreeConnection { tree_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create tree write error
    pub fn tree_write(tree_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TreeWrite {
            tree_name: tree_name.into(),
            message: message.into(),
        }
    }

    /// Create tree connection error
    pub fn tree_connection(tree_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TreeConnection {
            tree_name: tree_name.into(),
            message: message.into(),
        }
    }
}
