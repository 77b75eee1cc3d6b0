pub mod cleanup;
pub mod doctor;
pub mod intake;
pub mod runs;
pub mod serve;
pub mod snapshot;
pub mod tokens;

use anyhow::Context;
use clonekit_core::config::{Config, WarnLevel};
use std::path::Path;

/// Load and validate config, surfacing warnings through tracing.
pub(crate) fn load_config(root: &Path) -> anyhow::Result<Config> {
    let config = Config::load(root).context("failed to load config")?;
    for warning in config.validate() {
        if warning.level == WarnLevel::Warning {
            tracing::warn!("{}", warning.message);
        }
    }
    config.ensure_valid()?;
    Ok(config)
}
