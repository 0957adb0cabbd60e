//! Config validation
//!
//! Rules:
//! - field constraints declared with `validator` derives (non-empty names)
//! - tree names are unique
//! - crash buffer `capacity` within 1..=MAX_CRASH_BUFFER_CAPACITY
//! - remote trees name a parseable `addr`

use std::collections::HashSet;
use std::net::SocketAddr;

use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use contracts::{CanopyConfig, ContractError, TreeConfig, TreeType, MAX_CRASH_BUFFER_CAPACITY};

/// Validate a parsed config, returning the first violation found
pub fn validate(config: &CanopyConfig) -> Result<(), ContractError> {
    config
        .validate()
        .map_err(|errors| first_violation("", &errors))?;
    validate_unique_names(config)?;
    for (idx, tree) in config.trees.iter().enumerate() {
        match tree.tree_type {
            TreeType::CrashBuffer => validate_capacity(idx, tree)?,
            TreeType::Remote => validate_remote_addr(idx, tree)?,
            TreeType::Debug => {}
        }
    }
    Ok(())
}

/// Flatten nested derive errors into a single field path
fn first_violation(prefix: &str, errors: &ValidationErrors) -> ContractError {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                if let Some(err) = errs.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    return ContractError::config_validation(path, message);
                }
            }
            ValidationErrorsKind::Struct(inner) => return first_violation(&path, inner),
            ValidationErrorsKind::List(items) => {
                if let Some((idx, inner)) = items.iter().next() {
                    return first_violation(&format!("{path}[{idx}]"), inner);
                }
            }
        }
    }
    ContractError::config_validation(prefix, errors.to_string())
}

fn validate_unique_names(config: &CanopyConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for tree in &config.trees {
        if !seen.insert(tree.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("trees[name={}]", tree.name),
                "duplicate tree name",
            ));
        }
    }
    Ok(())
}

fn validate_capacity(idx: usize, tree: &TreeConfig) -> Result<(), ContractError> {
    let Some(raw) = tree.params.get("capacity") else {
        return Ok(());
    };
    let field = format!("trees[{idx}].params.capacity");
    let capacity: usize = raw
        .trim()
        .parse()
        .map_err(|_| ContractError::config_validation(&field, format!("'{raw}' is not a positive integer")))?;
    if capacity == 0 || capacity > MAX_CRASH_BUFFER_CAPACITY {
        return Err(ContractError::config_validation(
            field,
            format!("capacity must be between 1 and {MAX_CRASH_BUFFER_CAPACITY}, got {capacity}"),
        ));
    }
    Ok(())
}

fn validate_remote_addr(idx: usize, tree: &TreeConfig) -> Result<(), ContractError> {
    let field = format!("trees[{idx}].params.addr");
    let raw = tree
        .params
        .get("addr")
        .ok_or_else(|| ContractError::config_validation(&field, "remote tree requires an addr"))?;
    raw.parse::<SocketAddr>()
        .map_err(|e| ContractError::config_validation(field, format!("invalid address '{raw}': {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn minimal_config() -> CanopyConfig {
        let mut crash = tree("crash", TreeType::CrashBuffer);
        crash.params.insert("capacity".into(), "100".into());
        let mut remote = tree("collector", TreeType::Remote);
        remote.params.insert("addr".into(), "127.0.0.1:9000".into());

        CanopyConfig {
            trees: vec![tree("console", TreeType::Debug), crash, remote],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&minimal_config()).is_ok());
        assert!(validate(&CanopyConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_name() {
        let mut config = minimal_config();
        config.trees[1].name = String::new();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("trees[1].name"), "got: {err}");
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_duplicate_name() {
        let mut config = minimal_config();
        config.trees.push(tree("console", TreeType::Debug));
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate tree name"), "got: {err}");
    }

    #[test]
    fn test_capacity_bounds() {
        for bad in ["0", "10001", "-3", "lots"] {
            let mut config = minimal_config();
            config.trees[1].params.insert("capacity".into(), bad.into());
            let err = validate(&config).unwrap_err().to_string();
            assert!(err.contains("trees[1].params.capacity"), "{bad}: {err}");
        }

        let mut config = minimal_config();
        config.trees[1]
            .params
            .insert("capacity".into(), MAX_CRASH_BUFFER_CAPACITY.to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_remote_addr_required() {
        let mut config = minimal_config();
        config.trees[2].params.clear();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("requires an addr"), "got: {err}");

        config.trees[2]
            .params
            .insert("addr".into(), "not-an-addr".into());
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("invalid address"), "got: {err}");
    }
}
