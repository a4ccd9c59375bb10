// ============================================================================
// curator-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for PlanConfig
//
// Fluent construction of PlanConfig instances starting from the library
// defaults. `build` validates the result.

use std::path::PathBuf;

use super::{AacEncoder, PlanConfig};
use crate::error::CoreResult;

/// Builder for creating `PlanConfig` instances.
///
/// # Examples
///
/// ```rust
/// use curator_core::config::PlanConfigBuilder;
///
/// let config = PlanConfigBuilder::new()
///     .x264_crf(18)
///     .target_loudness_lufs(-24.0)
///     .max_concurrent_encodes(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.x264_crf, 18);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PlanConfigBuilder {
    config: PlanConfig,
}

impl PlanConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ffmpeg_path(mut self, path: impl Into<String>) -> Self {
        self.config.ffmpeg_path = path.into();
        self
    }

    pub fn target_loudness_lufs(mut self, lufs: f64) -> Self {
        self.config.target_loudness_lufs = lufs;
        self
    }

    pub fn gain_tolerance_db(mut self, db: f64) -> Self {
        self.config.gain_tolerance_db = db;
        self
    }

    pub fn x264_preset(mut self, preset: impl Into<String>) -> Self {
        self.config.x264_preset = preset.into();
        self
    }

    pub fn x264_crf(mut self, crf: u8) -> Self {
        self.config.x264_crf = crf;
        self
    }

    pub fn aac_encoder(mut self, encoder: AacEncoder) -> Self {
        self.config.aac_encoder = encoder;
        self
    }

    pub fn sample_interval_secs(mut self, secs: f64) -> Self {
        self.config.sample_interval_secs = secs;
        self
    }

    pub fn crop_sample_frames(mut self, frames: u32) -> Self {
        self.config.crop_sample_frames = frames;
        self
    }

    pub fn idet_sample_frames(mut self, frames: u32) -> Self {
        self.config.idet_sample_frames = frames;
        self
    }

    pub fn max_concurrent_encodes(mut self, count: usize) -> Self {
        self.config.max_concurrent_encodes = count;
        self
    }

    pub fn measurement_retries(mut self, attempts: u32) -> Self {
        self.config.measurement_retries = attempts;
        self
    }

    pub fn retry_delay_secs(mut self, secs: u64) -> Self {
        self.config.retry_delay_secs = secs;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> CoreResult<PlanConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
