// ============================================================================
// curator-core/src/processing/plan.rs
// ============================================================================
//
// TRANSCODE PLAN: The combined per-file decision handed to the assembler
//
// A plan is built once per source file from a fresh stream inventory,
// rendered exactly once into a command pipeline and then dropped.
//
// KEY COMPONENTS:
// - SubtitlePlan: text streams kept in the output, bitmap streams split out
// - TranscodePlan: video + audio + subtitle decisions for one source
// - ResolutionTier: 1080p/720p/480p label of the output frame

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::media::{StreamDescriptor, StreamInventory};
use crate::processing::audio_plan::AudioPlan;
use crate::processing::crop_scale::Dimensions;
use crate::processing::video_plan::VideoPlan;

/// Subtitle handling: MP4 only carries text subtitles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitlePlan {
    /// Converted to `mov_text` in the main output
    pub text: Vec<StreamDescriptor>,
    /// Extracted to a Matroska sidecar
    pub bitmap: Vec<StreamDescriptor>,
}

impl SubtitlePlan {
    pub fn from_inventory(inventory: &StreamInventory) -> Self {
        let mut plan = SubtitlePlan::default();
        for stream in inventory.subtitle_streams() {
            if stream.is_text_subtitle() {
                plan.text.push(stream.clone());
            } else if stream.is_bitmap_subtitle() {
                plan.bitmap.push(stream.clone());
            } else {
                log::warn!(
                    "Dropping subtitle stream {} with unsupported codec {}",
                    stream.index,
                    stream.codec_name
                );
            }
        }
        if !plan.bitmap.is_empty() {
            log::warn!(
                "{} bitmap subtitle stream(s) cannot be stored in MP4; writing a sidecar",
                plan.bitmap.len()
            );
        }
        plan
    }
}

/// Resolution class of an output frame, used in library file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionTier {
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "480p")]
    Sd480,
}

impl ResolutionTier {
    /// Tier of a frame; anything wider or taller than the next tier down
    /// belongs to the higher one.
    pub fn for_dimensions(dimensions: Dimensions) -> Self {
        if dimensions.height > 720 || dimensions.width > 1280 {
            ResolutionTier::Hd1080
        } else if dimensions.height > 480 || dimensions.width > 854 {
            ResolutionTier::Hd720
        } else {
            ResolutionTier::Sd480
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionTier::Hd1080 => "1080p",
            ResolutionTier::Hd720 => "720p",
            ResolutionTier::Sd480 => "480p",
        }
    }
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Every decision for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodePlan {
    pub source: PathBuf,
    pub video: VideoPlan,
    pub audio: AudioPlan,
    pub subtitles: SubtitlePlan,
}

impl TranscodePlan {
    pub fn resolution_tier(&self) -> ResolutionTier {
        ResolutionTier::for_dimensions(self.video.output_dimensions())
    }

    /// Number of audio tracks the encoded output must contain.
    pub fn expected_audio_tracks(&self) -> usize {
        self.audio.output_track_count()
    }

    /// Whether anything at all is re-encoded.
    pub fn is_remux_only(&self) -> bool {
        !self.video.convert && self.audio.tracks.iter().all(|t| !t.decision.convert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let tier = |w, h| ResolutionTier::for_dimensions(Dimensions::new(w, h));
        assert_eq!(tier(1920, 800), ResolutionTier::Hd1080);
        assert_eq!(tier(1280, 720), ResolutionTier::Hd720);
        assert_eq!(tier(1280, 534), ResolutionTier::Hd720);
        assert_eq!(tier(1440, 600), ResolutionTier::Hd1080);
        assert_eq!(tier(854, 480), ResolutionTier::Sd480);
        assert_eq!(tier(720, 576), ResolutionTier::Hd720);
        assert_eq!(ResolutionTier::Sd480.to_string(), "480p");
    }

    #[test]
    fn test_subtitle_split() {
        let inventory = StreamInventory::new(
            "/media/in.mkv",
            None,
            vec![
                StreamDescriptor::video(0, "h264", 1920, 1080),
                StreamDescriptor::subtitle(2, "subrip", Some("eng")),
                StreamDescriptor::subtitle(3, "hdmv_pgs_subtitle", Some("eng")),
                StreamDescriptor::subtitle(4, "eia_608", None),
            ],
        );
        let plan = SubtitlePlan::from_inventory(&inventory);
        assert_eq!(plan.text.len(), 1);
        assert_eq!(plan.text[0].index, 2);
        assert_eq!(plan.bitmap.len(), 1);
        assert_eq!(plan.bitmap[0].index, 3);
    }
}
