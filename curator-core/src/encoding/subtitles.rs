//! Bitmap subtitle sidecar extraction.
//!
//! PGS and DVD subtitles cannot be stored in MP4, so they are copied into a
//! Matroska file next to the encoded output instead of being dropped.

use std::path::{Path, PathBuf};

use crate::external::pipeline::CommandStage;
use crate::processing::plan::SubtitlePlan;

pub const SIDECAR_STAGE: &str = "ffmpeg (subtitle sidecar)";

/// Sidecar path for `output`: `<stem>.subs.mkv` in the same directory.
pub fn sidecar_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}.subs.mkv"))
}

/// Stage copying every bitmap subtitle stream of `source` into `dest`.
///
/// Returns `None` when the plan has no bitmap subtitles.
pub fn sidecar_stage(
    ffmpeg: &str,
    source: &Path,
    subtitles: &SubtitlePlan,
    dest: &Path,
) -> Option<CommandStage> {
    if subtitles.bitmap.is_empty() {
        return None;
    }

    let mut stage = CommandStage::new(SIDECAR_STAGE, ffmpeg);
    stage.args(["-hide_banner", "-nostats", "-y"]);
    stage.args(["-i".to_string(), source.to_string_lossy().into_owned()]);
    for stream in &subtitles.bitmap {
        stage.args(["-map".to_string(), format!("0:{}", stream.index)]);
    }
    for (n, stream) in subtitles.bitmap.iter().enumerate() {
        stage.args([
            format!("-c:s:{n}"),
            "copy".to_string(),
            format!("-metadata:s:s:{n}"),
            format!("language={}", stream.language),
        ]);
    }
    stage.args(["-vn", "-an", "-f", "matroska"]);
    stage.arg(dest.to_string_lossy());
    Some(stage)
}
