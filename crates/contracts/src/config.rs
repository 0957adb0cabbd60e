//! CanopyConfig - Config Loader output
//!
//! Describes the forest to plant: build mode and the trees with their
//! thresholds and type-specific parameters.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use validator::Validate;

use crate::LogLevel;

/// Largest accepted crash buffer capacity
pub const MAX_CRASH_BUFFER_CAPACITY: usize = 10_000;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Dispatch gating mode.
///
/// `Debug` dispatches every call. `Release` skips calls entirely unless at
/// least one planted tree is not debug-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    Debug,
    Release,
}

impl Default for BuildMode {
    /// Follows the compilation profile of the final binary
    fn default() -> Self {
        if cfg!(debug_assertions) {
            BuildMode::Debug
        } else {
            BuildMode::Release
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildMode::Debug => "debug",
            BuildMode::Release => "release",
        })
    }
}

/// Complete forest configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CanopyConfig {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Dispatch gating mode
    #[serde(default)]
    pub build_mode: BuildMode,

    /// Trees to plant, in order
    #[serde(default)]
    #[validate(nested)]
    pub trees: Vec<TreeConfig>,
}

/// One tree to plant
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TreeConfig {
    /// Tree name (diagnostics, `info` output)
    #[validate(length(min = 1, message = "tree name cannot be empty"))]
    pub name: String,

    /// Tree type
    pub tree_type: TreeType,

    /// Minimum level; `None` keeps the tree type's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_level: Option<LogLevel>,

    /// Wrap the tree so its work runs on a background thread
    #[serde(default, rename = "async")]
    pub async_dispatch: bool,

    /// Type-specific parameters
    #[serde(default, deserialize_with = "scalar_map")]
    pub params: HashMap<String, String>,
}

/// Tree type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeType {
    /// Console output through `tracing`
    Debug,
    /// Bounded in-memory buffer persisted on crash
    CrashBuffer,
    /// Batched delivery to a remote collector
    Remote,
}

impl fmt::Display for TreeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TreeType::Debug => "debug",
            TreeType::CrashBuffer => "crash_buffer",
            TreeType::Remote => "remote",
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Str(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// Accept `key = 100` as well as `key = "100"` in params tables
fn scalar_map<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, Scalar>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (k, v.into())).collect())
}
