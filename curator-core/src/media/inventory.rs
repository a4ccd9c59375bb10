//! Typed stream inventory of a probed media file.
//!
//! A `StreamInventory` is produced once per source file by a `MediaProber`
//! and never mutated afterwards. Planning stages attach their decisions as
//! separate values instead of editing the descriptors.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Language tag ffprobe reports when a stream carries none.
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Video codecs that only ever carry cover art or thumbnails.
const COVER_ART_CODECS: &[&str] = &["mjpeg", "png", "bmp"];

/// Kind of elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

/// One probed elementary stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Source-order index, the stream's stable identity.
    pub index: u32,
    pub kind: StreamKind,
    pub codec_name: String,
    /// Audio channel count (0 for non-audio streams).
    pub channels: u32,
    /// Frame width in pixels (0 for non-video streams).
    pub width: u32,
    /// Frame height in pixels (0 for non-video streams).
    pub height: u32,
    /// ISO-639 language tag, `und` when the container carries none.
    pub language: String,
    /// Set when the container flags the stream as an attached picture.
    #[serde(default)]
    pub attached_pic: bool,
}

impl StreamDescriptor {
    pub fn video(index: u32, codec_name: &str, width: u32, height: u32) -> Self {
        Self {
            index,
            kind: StreamKind::Video,
            codec_name: codec_name.to_string(),
            channels: 0,
            width,
            height,
            language: UNDETERMINED_LANGUAGE.to_string(),
            attached_pic: false,
        }
    }

    pub fn audio(index: u32, codec_name: &str, channels: u32, language: Option<&str>) -> Self {
        Self {
            index,
            kind: StreamKind::Audio,
            codec_name: codec_name.to_string(),
            channels,
            width: 0,
            height: 0,
            language: language.unwrap_or(UNDETERMINED_LANGUAGE).to_string(),
            attached_pic: false,
        }
    }

    pub fn subtitle(index: u32, codec_name: &str, language: Option<&str>) -> Self {
        Self {
            index,
            kind: StreamKind::Subtitle,
            codec_name: codec_name.to_string(),
            channels: 0,
            width: 0,
            height: 0,
            language: language.unwrap_or(UNDETERMINED_LANGUAGE).to_string(),
            attached_pic: false,
        }
    }

    pub fn is_h264(&self) -> bool {
        self.codec_name == "h264"
    }

    /// AAC in any of the encoder spellings ffprobe may report.
    pub fn is_aac_family(&self) -> bool {
        matches!(self.codec_name.as_str(), "aac" | "libfdk_aac")
    }

    /// AC-3 or DTS, the surround formats passed through untouched.
    pub fn is_ac3_or_dts(&self) -> bool {
        matches!(self.codec_name.as_str(), "ac3" | "dts" | "dca")
    }

    pub fn is_stereo_or_less(&self) -> bool {
        self.channels <= 2
    }

    /// Multichannel AAC cannot be downmixed directly and needs an AC-3 hop.
    pub fn is_multichannel_aac(&self) -> bool {
        self.is_aac_family() && !self.is_stereo_or_less()
    }

    pub fn is_cover_art(&self) -> bool {
        self.kind == StreamKind::Video
            && (self.attached_pic || COVER_ART_CODECS.contains(&self.codec_name.as_str()))
    }

    /// Text subtitle formats that can be converted to `mov_text`.
    pub fn is_text_subtitle(&self) -> bool {
        matches!(
            self.codec_name.as_str(),
            "subrip" | "srt" | "ass" | "ssa" | "webvtt" | "mov_text" | "text"
        )
    }

    /// Bitmap subtitle formats that MP4 cannot carry.
    pub fn is_bitmap_subtitle(&self) -> bool {
        matches!(
            self.codec_name.as_str(),
            "hdmv_pgs_subtitle" | "pgssub" | "dvd_subtitle" | "dvdsub" | "dvb_subtitle"
        )
    }
}

/// All streams of one probed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInventory {
    pub source: PathBuf,
    /// Container duration in seconds, when the prober could read it.
    pub duration_secs: Option<f64>,
    pub streams: Vec<StreamDescriptor>,
}

impl StreamInventory {
    pub fn new(source: impl Into<PathBuf>, duration_secs: Option<f64>, streams: Vec<StreamDescriptor>) -> Self {
        let mut streams = streams;
        streams.sort_by_key(|s| s.index);
        Self {
            source: source.into(),
            duration_secs,
            streams,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Video streams in index order, cover art excluded.
    pub fn video_streams(&self) -> Vec<&StreamDescriptor> {
        self.streams
            .iter()
            .filter(|s| s.kind == StreamKind::Video && !s.is_cover_art())
            .collect()
    }

    pub fn audio_streams(&self) -> Vec<&StreamDescriptor> {
        self.of_kind(StreamKind::Audio)
    }

    pub fn subtitle_streams(&self) -> Vec<&StreamDescriptor> {
        self.of_kind(StreamKind::Subtitle)
    }

    pub fn stream(&self, index: u32) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.index == index)
    }

    fn of_kind(&self, kind: StreamKind) -> Vec<&StreamDescriptor> {
        self.streams.iter().filter(|s| s.kind == kind).collect()
    }
}
