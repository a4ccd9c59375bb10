//! FFprobe integration producing typed stream inventories.
//!
//! The `ffprobe` crate runs `ffprobe -show_format -show_streams` and
//! deserializes its JSON; this module maps that output into the
//! `StreamInventory` the planners consume.

use crate::error::{CoreError, CoreResult};
use crate::media::{StreamDescriptor, StreamInventory, StreamKind, UNDETERMINED_LANGUAGE};
use ffprobe::{FfProbe, FfProbeError, ffprobe};
use std::path::Path;

/// Inspects a media file and reports its streams.
pub trait MediaProber {
    fn probe(&self, path: &Path) -> CoreResult<StreamInventory>;
}

/// `MediaProber` backed by the `ffprobe` crate.
#[derive(Debug, Clone, Default)]
pub struct CrateFfprobeExecutor;

impl CrateFfprobeExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl MediaProber for CrateFfprobeExecutor {
    fn probe(&self, path: &Path) -> CoreResult<StreamInventory> {
        log::debug!("Running ffprobe (via crate) on: {}", path.display());
        let metadata = ffprobe(path).map_err(|err| {
            log::error!("ffprobe failed on {}: {:?}", path.display(), err);
            map_ffprobe_error(err)
        })?;
        inventory_from_metadata(path, &metadata)
    }
}

/// Maps deserialized ffprobe output into a `StreamInventory`.
pub fn inventory_from_metadata(path: &Path, metadata: &FfProbe) -> CoreResult<StreamInventory> {
    let duration_secs = metadata
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok());

    let mut streams = Vec::with_capacity(metadata.streams.len());
    for stream in &metadata.streams {
        let kind = match stream.codec_type.as_deref() {
            Some("video") => StreamKind::Video,
            Some("audio") => StreamKind::Audio,
            Some("subtitle") => StreamKind::Subtitle,
            _ => continue,
        };

        // Disposition and tag shapes vary between ffprobe crate releases,
        // so they are read through the serialized form.
        let raw = serde_json::to_value(stream)?;
        let index = raw
            .get("index")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| CoreError::ProbeFailed(format!("stream without index in {}", path.display())))?;
        let attached_pic = raw
            .pointer("/disposition/attached_pic")
            .and_then(|v| v.as_i64())
            .is_some_and(|v| v != 0);
        let language = raw
            .pointer("/tags/language")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(UNDETERMINED_LANGUAGE)
            .to_string();

        streams.push(StreamDescriptor {
            index: index as u32,
            kind,
            codec_name: stream.codec_name.clone().unwrap_or_default(),
            channels: non_negative(stream.channels),
            width: non_negative(stream.width),
            height: non_negative(stream.height),
            language,
            attached_pic,
        });
    }

    log::debug!(
        "Probed {}: {} streams, duration {:?}",
        path.display(),
        streams.len(),
        duration_secs
    );
    Ok(StreamInventory::new(path, duration_secs, streams))
}

fn non_negative(value: Option<i64>) -> u32 {
    value.filter(|v| *v > 0).map_or(0, |v| v as u32)
}

/// Every ffprobe failure surfaces as `ProbeFailed`; the cause stays in the
/// message.
fn map_ffprobe_error(err: FfProbeError) -> CoreError {
    let detail = match err {
        FfProbeError::Io(io_err) => format!("could not run ffprobe: {io_err}"),
        FfProbeError::Status(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            format!("ffprobe exited with {}: {}", output.status, stderr.trim())
        }
        FfProbeError::Deserialize(err) => format!("unreadable ffprobe output: {err}"),
        other => format!("unknown ffprobe error: {other:?}"),
    };
    CoreError::ProbeFailed(detail)
}
