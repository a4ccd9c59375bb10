// ============================================================================
// curator-core/src/external/ffmpeg_builder.rs
// ============================================================================
//
// FFMPEG COMMAND BUILDER: Common ffmpeg command and filter construction
//
// KEY COMPONENTS:
// - FfmpegCommandBuilder: sidecar command with the configured binary
// - VideoFilterChain: ordered deinterlace/pad/crop/scale filter string

use crate::processing::crop_scale::{Dimensions, Geometry};
use crate::processing::deinterlace::FieldOrder;
use ffmpeg_sidecar::command::FfmpegCommand;

/// Builder for ffmpeg-sidecar commands with common settings.
pub struct FfmpegCommandBuilder {
    ffmpeg_path: String,
}

impl Default for FfmpegCommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegCommandBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }

    #[must_use]
    pub fn with_ffmpeg_path(mut self, path: &str) -> Self {
        self.ffmpeg_path = path.to_string();
        self
    }

    /// Command for the configured binary with the banner suppressed.
    #[must_use]
    pub fn build(self) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new_with_path(&self.ffmpeg_path);
        cmd.arg("-hide_banner");
        cmd
    }
}

/// Video filter chain in encoder order: deinterlace, pad, crop, scale.
///
/// Each stage may be added at most once and is emitted in that fixed order
/// regardless of call order.
#[derive(Debug, Default)]
pub struct VideoFilterChain {
    deinterlace: Option<String>,
    pad: Option<String>,
    crop: Option<String>,
    scale: Option<String>,
}

impl VideoFilterChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `yadif` for interlaced verdicts; other verdicts add nothing.
    #[must_use]
    pub fn add_deinterlace(mut self, order: FieldOrder) -> Self {
        self.deinterlace = order.yadif_parity().map(|parity| format!("yadif=parity={parity}"));
        self
    }

    #[must_use]
    pub fn add_pad(mut self, pad: Option<Geometry>) -> Self {
        self.pad = pad.map(|p| format!("pad={}:{}:{}:{}", p.width, p.height, p.x, p.y));
        self
    }

    #[must_use]
    pub fn add_crop(mut self, crop: Option<Geometry>) -> Self {
        self.crop = crop.map(|c| format!("crop={}:{}:{}:{}", c.width, c.height, c.x, c.y));
        self
    }

    #[must_use]
    pub fn add_scale(mut self, scale: Option<Dimensions>) -> Self {
        self.scale = scale.map(|s| format!("scale={}:{}", s.width, s.height));
        self
    }

    #[must_use]
    pub fn build(self) -> Option<String> {
        let filters: Vec<String> = [self.deinterlace, self.pad, self.crop, self.scale]
            .into_iter()
            .flatten()
            .collect();
        if filters.is_empty() {
            None
        } else {
            Some(filters.join(","))
        }
    }
}
