//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

use anyhow::{Context, Result};
use curator_core::{PlanConfig, check_dependency};

/// Dry-run planning of a single file.
pub mod plan;

/// Full processing of one or more files.
pub mod process;

/// Fails early when ffmpeg or ffprobe cannot be started.
pub(crate) fn check_tools(config: &PlanConfig) -> Result<()> {
    check_dependency(&config.ffmpeg_path)
        .with_context(|| format!("'{}' is required", config.ffmpeg_path))?;
    check_dependency("ffprobe").context("'ffprobe' is required")?;
    Ok(())
}
