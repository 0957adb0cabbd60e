//! Config parsing
//!
//! TOML (primary) and JSON.

use contracts::{CanopyConfig, ContractError};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<CanopyConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<CanopyConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<CanopyConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BuildMode, LogLevel, TreeType};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
build_mode = "release"

[[trees]]
name = "console"
tree_type = "debug"

[[trees]]
name = "crash"
tree_type = "crash_buffer"
min_level = "warning"
[trees.params]
capacity = 200
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.build_mode, BuildMode::Release);
        assert_eq!(config.trees.len(), 2);
        assert_eq!(config.trees[1].tree_type, TreeType::CrashBuffer);
        assert_eq!(config.trees[1].min_level, Some(LogLevel::Warning));
        assert_eq!(config.trees[1].params["capacity"], "200");
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "build_mode": "debug",
            "trees": [
                { "name": "console", "tree_type": "debug", "async": true },
                { "name": "collector", "tree_type": "remote",
                  "params": { "addr": "127.0.0.1:9000", "sampling_rate": 0.5 } }
            ]
        }"#;
        let config = parse_json(content).unwrap();
        assert!(config.trees[0].async_dispatch);
        assert_eq!(config.trees[1].params["sampling_rate"], "0.5");
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_tree_type_is_parse_error() {
        let content = r#"
[[trees]]
name = "x"
tree_type = "syslog"
"#;
        let err = parse_toml(content).unwrap_err();
        assert!(err.to_string().contains("syslog"), "got: {err}");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
