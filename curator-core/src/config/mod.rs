//! Configuration structures and constants for the curator-core library.
//!
//! `PlanConfig` holds the tunables of the planner and the executor; it is
//! passed explicitly into every builder, assembler and orchestrator call.
//! `TranscodeOptions` is the per-file target policy.

mod builder;

use crate::error::{CoreError, CoreResult};
use crate::processing::deinterlace::FieldOrder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use builder::PlanConfigBuilder;

// Default constants

/// Integrated loudness every converted audio track is normalised to.
pub const DEFAULT_TARGET_LOUDNESS_LUFS: f64 = -23.0;

/// Loudness deviation tolerated before gain is applied.
pub const DEFAULT_GAIN_TOLERANCE_DB: f64 = 1.0;

/// x264 preset used for every video re-encode.
pub const DEFAULT_X264_PRESET: &str = "fast";

/// x264 CRF quality target used for every video re-encode.
pub const DEFAULT_X264_CRF: u8 = 20;

/// Seconds of source between two crop/idet sample points.
pub const DEFAULT_SAMPLE_INTERVAL_SECS: f64 = 240.0;

/// Frames analysed by cropdetect at each sample point.
pub const DEFAULT_CROP_SAMPLE_FRAMES: u32 = 20;

/// Frames analysed by idet at each sample point.
pub const DEFAULT_IDET_SAMPLE_FRAMES: u32 = 200;

/// Heavy encodes allowed to run at once across all files.
pub const DEFAULT_MAX_CONCURRENT_ENCODES: usize = 2;

/// Attempts made for an external measurement call before giving up.
pub const DEFAULT_MEASUREMENT_RETRIES: u32 = 3;

/// AAC encoder used for converted (stereo) audio tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoder", rename_all = "snake_case")]
pub enum AacEncoder {
    /// Fraunhofer FDK AAC in VBR mode.
    Fdk { vbr: u8, cutoff_hz: u32 },
    /// ffmpeg's native AAC encoder at a constant bitrate.
    Native { bitrate_kbps: u32 },
}

impl Default for AacEncoder {
    fn default() -> Self {
        AacEncoder::Fdk {
            vbr: 5,
            cutoff_hz: 20_000,
        }
    }
}

impl AacEncoder {
    /// Codec name passed to `-c:a:N`.
    pub fn codec_name(&self) -> &'static str {
        match self {
            AacEncoder::Fdk { .. } => "libfdk_aac",
            AacEncoder::Native { .. } => "aac",
        }
    }

    /// Encoder options for output audio track `track`.
    pub fn track_args(&self, track: usize) -> Vec<String> {
        match self {
            AacEncoder::Fdk { vbr, cutoff_hz } => vec![
                format!("-vbr:a:{track}"),
                vbr.to_string(),
                format!("-cutoff:a:{track}"),
                cutoff_hz.to_string(),
            ],
            AacEncoder::Native { bitrate_kbps } => {
                vec![format!("-b:a:{track}"), format!("{bitrate_kbps}k")]
            }
        }
    }
}

/// Tunables of the planner and executor.
///
/// All fields have defaults matching the library policy, so a config file
/// only needs to name the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// ffmpeg executable name or path
    pub ffmpeg_path: String,

    /// Integrated loudness target in LUFS
    pub target_loudness_lufs: f64,

    /// Deviation from the target (dB) below which no gain is applied
    pub gain_tolerance_db: f64,

    /// x264 preset for video re-encodes
    pub x264_preset: String,

    /// x264 CRF for video re-encodes
    pub x264_crf: u8,

    /// Encoder for converted stereo AAC tracks
    pub aac_encoder: AacEncoder,

    /// Seconds between crop/idet sample points
    pub sample_interval_secs: f64,

    /// Frames analysed per cropdetect sample
    pub crop_sample_frames: u32,

    /// Frames analysed per idet sample
    pub idet_sample_frames: u32,

    /// Concurrent heavy encodes allowed across files
    pub max_concurrent_encodes: usize,

    /// Attempts for external measurement calls
    pub measurement_retries: u32,

    /// Delay between measurement attempts, in seconds
    pub retry_delay_secs: u64,

    /// Directory encodes are staged in before being moved to the output
    /// path (the output's own directory when unset)
    pub temp_dir: Option<PathBuf>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            target_loudness_lufs: DEFAULT_TARGET_LOUDNESS_LUFS,
            gain_tolerance_db: DEFAULT_GAIN_TOLERANCE_DB,
            x264_preset: DEFAULT_X264_PRESET.to_string(),
            x264_crf: DEFAULT_X264_CRF,
            aac_encoder: AacEncoder::default(),
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
            crop_sample_frames: DEFAULT_CROP_SAMPLE_FRAMES,
            idet_sample_frames: DEFAULT_IDET_SAMPLE_FRAMES,
            max_concurrent_encodes: DEFAULT_MAX_CONCURRENT_ENCODES,
            measurement_retries: DEFAULT_MEASUREMENT_RETRIES,
            retry_delay_secs: 5,
            temp_dir: None,
        }
    }
}

impl PlanConfig {
    /// Loads a config from a TOML file; missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PlanConfig = toml::from_str(&text)?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Rejects values the planner cannot work with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.target_loudness_lufs >= 0.0 {
            return Err(CoreError::Config(format!(
                "target loudness must be negative LUFS, got {}",
                self.target_loudness_lufs
            )));
        }
        if self.gain_tolerance_db < 0.0 {
            return Err(CoreError::Config(format!(
                "gain tolerance must not be negative, got {}",
                self.gain_tolerance_db
            )));
        }
        if self.x264_crf > 51 {
            return Err(CoreError::Config(format!(
                "x264 CRF must be within 0-51, got {}",
                self.x264_crf
            )));
        }
        if self.max_concurrent_encodes == 0 {
            return Err(CoreError::Config(
                "max_concurrent_encodes must be at least 1".to_string(),
            ));
        }
        if self.measurement_retries == 0 {
            return Err(CoreError::Config(
                "measurement_retries must be at least 1".to_string(),
            ));
        }
        if self.sample_interval_secs <= 0.0 {
            return Err(CoreError::Config(
                "sample_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory the encode of `output` is staged in.
    pub fn staging_dir(&self, output: &Path) -> PathBuf {
        if let Some(dir) = &self.temp_dir {
            return dir.clone();
        }
        output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }
}

/// Per-file target policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeOptions {
    /// Remove detected letterbox/pillarbox bars
    pub allow_crop: bool,
    /// Scale down to this tier height (1080, 720 or 480)
    pub max_height: Option<u32>,
    /// Deinterlace when the source is detected as interlaced
    pub deinterlace: bool,
    /// Skip field-order sampling and use this verdict
    pub forced_field_order: Option<FieldOrder>,
    /// Keep non-default audio tracks
    pub keep_other_audio: bool,
}

impl TranscodeOptions {
    /// Whether the video plan needs any external sampling.
    pub fn needs_sampling(&self) -> bool {
        self.allow_crop || self.deinterlace || self.max_height.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = PlanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.target_loudness_lufs, -23.0);
        assert_eq!(config.x264_crf, 20);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = PlanConfig {
            max_concurrent_encodes: 0,
            ..PlanConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        let config = PlanConfig {
            target_loudness_lufs: 3.0,
            ..PlanConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curator.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "x264_crf = 18").unwrap();
        writeln!(file, "[aac_encoder]").unwrap();
        writeln!(file, "encoder = \"native\"").unwrap();
        writeln!(file, "bitrate_kbps = 192").unwrap();

        let config = PlanConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.x264_crf, 18);
        assert_eq!(config.x264_preset, "fast");
        assert_eq!(config.aac_encoder, AacEncoder::Native { bitrate_kbps: 192 });
    }

    #[test]
    fn test_staging_dir_defaults_to_output_dir() {
        let config = PlanConfig::default();
        assert_eq!(
            config.staging_dir(Path::new("/work/movies/Heat (1995).mp4")),
            PathBuf::from("/work/movies")
        );
        assert_eq!(config.staging_dir(Path::new("out.mp4")), PathBuf::from("."));
    }

    #[test]
    fn test_aac_track_args() {
        let args = AacEncoder::default().track_args(1);
        assert_eq!(args, vec!["-vbr:a:1", "5", "-cutoff:a:1", "20000"]);
        assert_eq!(AacEncoder::default().codec_name(), "libfdk_aac");
    }
}
