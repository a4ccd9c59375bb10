// curator-cli/src/config.rs
//
// Resolves the PlanConfig from an optional TOML file and CLI overrides.

use anyhow::{Context, Result};
use curator_core::PlanConfig;
use std::path::Path;

/// Loads the config file when given, else the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<PlanConfig> {
    match path {
        Some(path) => PlanConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config file '{}'", path.display())),
        None => Ok(PlanConfig::default()),
    }
}
