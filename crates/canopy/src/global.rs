//! Process-wide forest handle
//!
//! One [`Forest`] per process, installed at startup with [`init`] or
//! [`install`], or created with default settings on first use of
//! [`global`]. All locking lives inside the forest itself.

use std::sync::{Arc, OnceLock};

use tracing::info;

use contracts::{CanopyConfig, SharedError, Tree};

use crate::builder::create_forest;
use crate::error::CanopyError;
use crate::forest::Forest;
use crate::proxy::TaggedProxy;

static GLOBAL: OnceLock<Forest> = OnceLock::new();

/// Build the forest described by `config` and install it process-wide
pub fn init(config: &CanopyConfig) -> Result<&'static Forest, CanopyError> {
    if GLOBAL.get().is_some() {
        return Err(CanopyError::AlreadyInitialized);
    }
    install(create_forest(config)?)
}

/// Install an already built forest process-wide.
///
/// Fails if a forest was installed before, including the default one
/// created by an earlier call to [`global`].
pub fn install(forest: Forest) -> Result<&'static Forest, CanopyError> {
    let mut installed = false;
    let global = GLOBAL.get_or_init(|| {
        installed = true;
        forest
    });
    if !installed {
        return Err(CanopyError::AlreadyInitialized);
    }
    info!(
        target: "canopy::diagnostics",
        build_mode = %global.build_mode(),
        trees = global.tree_count(),
        "Global forest installed"
    );
    Ok(global)
}

/// The process-wide forest
pub fn global() -> &'static Forest {
    GLOBAL.get_or_init(Forest::default)
}

pub fn plant<I>(trees: I)
where
    I: IntoIterator<Item = Arc<dyn Tree>>,
{
    global().plant(trees);
}

pub fn plant_one(tree: Arc<dyn Tree>) {
    global().plant_one(tree);
}

pub fn uproot_all() {
    global().uproot_all();
}

pub fn tag<'a>(tag: impl Into<Option<&'a str>>) -> TaggedProxy<'a> {
    global().tag(tag)
}

pub fn error(error: SharedError) -> TaggedProxy<'static> {
    global().error(error)
}
