//! Canopy error types

use thiserror::Error;

/// Errors raised while building or installing a forest.
///
/// Logging calls themselves never fail; these only surface from
/// construction and configuration paths.
#[derive(Debug, Error)]
pub enum CanopyError {
    /// Tree creation error
    #[error("failed to create tree '{name}': {message}")]
    TreeCreation { name: String, message: String },

    /// The process-wide forest was installed already
    #[error("global forest already initialised")]
    AlreadyInitialized,

    /// Error from a contract type
    #[error("tree error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CanopyError {
    /// Create a tree creation error
    pub fn tree_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TreeCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
