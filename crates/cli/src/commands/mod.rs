//! Command implementations.

mod crash_log;
mod info;
mod run;
mod validate;

pub use crash_log::run_crash_log;
pub use info::run_info;
pub use run::run_traffic;
pub use validate::run_validate;

use std::path::Path;

use contracts::CanopyConfig;

use crate::error::{CliError, Result};

/// Load and validate a configuration file
pub(crate) fn load_config(path: &Path) -> Result<CanopyConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path));
    }
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}
