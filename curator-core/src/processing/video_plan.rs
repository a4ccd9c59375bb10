// ============================================================================
// curator-core/src/processing/video_plan.rs
// ============================================================================
//
// VIDEO PLAN BUILDER: Copy-or-convert decision for the default video stream
//
// Selects the default video stream, optionally samples it for crop and
// field order, runs the crop/scale solver and decides whether the stream
// can be copied or has to be re-encoded with a filter chain.
//
// KEY COMPONENTS:
// - VideoPlan: the resolved video action
// - build_video_plan: selection, sampling, solving, convert decision
// - sample_count_for: seek points for a given duration
// - largest_crop: aggregation of raw cropdetect boxes

use serde::{Deserialize, Serialize};

use crate::config::{PlanConfig, TranscodeOptions};
use crate::error::{CoreError, CoreResult};
use crate::external::FrameSampler;
use crate::media::{StreamDescriptor, StreamInventory};
use crate::processing::crop_scale::{self, Dimensions, Geometry};
use crate::processing::deinterlace::{self, FieldOrder};

/// Resolved action for the default video stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoPlan {
    /// Source index of the selected video stream
    pub stream_index: u32,
    pub codec_name: String,
    /// Source frame size
    pub source: Dimensions,
    pub pad: Option<Geometry>,
    pub crop: Option<Geometry>,
    pub scale: Option<Dimensions>,
    pub field_order: FieldOrder,
    /// Whether the encode applies yadif for an interlaced verdict
    pub deinterlace: bool,
    /// Re-encode instead of copying
    pub convert: bool,
}

impl VideoPlan {
    /// Frame size the encoder will emit.
    pub fn output_dimensions(&self) -> Dimensions {
        self.scale
            .or_else(|| self.crop.map(|c| c.dimensions()))
            .unwrap_or(self.source)
    }
}

/// Number of interior seek points for a file of `duration_secs`.
///
/// Files shorter than two intervals (or of unknown length) get a single
/// whole-file pass, signalled by zero.
pub fn sample_count_for(duration_secs: Option<f64>, interval_secs: f64) -> usize {
    let Some(duration) = duration_secs else {
        return 0;
    };
    let intervals = (duration / interval_secs).floor() as usize;
    if intervals > 1 { intervals - 1 } else { 0 }
}

/// Largest detected box by (width, height); later boxes win ties.
pub fn largest_crop(samples: &[Geometry]) -> Option<Geometry> {
    samples.iter().copied().max_by_key(|g| (g.width, g.height))
}

/// Picks the default video stream: the first H.264 stream, else the first.
fn select_default<'a>(videos: &[&'a StreamDescriptor]) -> Option<&'a StreamDescriptor> {
    if videos.len() > 1 {
        log::warn!("More than one video stream ({} found)", videos.len());
        if let Some(h264) = videos.iter().copied().find(|s| s.is_h264()) {
            log::debug!("Using first h264 stream (index {}), ignoring others", h264.index);
            return Some(h264);
        }
        log::debug!("Using first video stream, ignoring others");
    }
    videos.first().copied()
}

/// Builds the video plan for `inventory`.
///
/// The sampler is only called when cropping, scaling or deinterlacing is
/// requested; a forced field order skips idet sampling.
pub fn build_video_plan<F: FrameSampler>(
    inventory: &StreamInventory,
    options: &TranscodeOptions,
    config: &PlanConfig,
    sampler: &F,
) -> CoreResult<VideoPlan> {
    let videos = inventory.video_streams();
    let stream = select_default(&videos).ok_or(CoreError::NoVideoStream)?;
    let source = Dimensions::new(stream.width, stream.height);

    let mut geometry = crop_scale::CropScale::default();
    let mut field_order = FieldOrder::NotEvaluated;

    if options.needs_sampling() {
        let samples = sample_count_for(inventory.duration_secs, config.sample_interval_secs);

        let detected = if options.allow_crop {
            let boxes = sampler.sample_crop(inventory.source(), stream.index, samples)?;
            let largest = largest_crop(&boxes);
            if largest.is_none() {
                log::warn!("Crop detection produced no samples; keeping full frame");
            }
            largest
        } else {
            None
        };

        geometry = crop_scale::solve(source, options.max_height, detected)?;

        if options.deinterlace {
            field_order = match options.forced_field_order {
                Some(forced) => {
                    log::info!("Using forced field order: {forced}");
                    forced
                }
                None => {
                    let counts =
                        sampler.sample_field_order(inventory.source(), stream.index, samples)?;
                    deinterlace::classify(&counts)
                }
            };
        }
    }

    let deinterlace = options.deinterlace && field_order.is_interlaced();
    let convert = !stream.is_h264() || !geometry.is_identity() || deinterlace;

    let plan = VideoPlan {
        stream_index: stream.index,
        codec_name: stream.codec_name.clone(),
        source,
        pad: geometry.pad,
        crop: geometry.crop,
        scale: geometry.scale,
        field_order,
        deinterlace,
        convert,
    };
    log_plan(&plan);
    Ok(plan)
}

fn log_plan(plan: &VideoPlan) {
    if let Some(pad) = plan.pad {
        log::info!("Will pad to {}:{}:{}:{}", pad.width, pad.height, pad.x, pad.y);
    }
    if let Some(crop) = plan.crop {
        log::info!("Will crop to {}:{}:{}:{}", crop.width, crop.height, crop.x, crop.y);
    }
    if let Some(scale) = plan.scale {
        log::info!("Will scale to {}:{}", scale.width, scale.height);
    }
    if plan.deinterlace {
        log::info!("Will deinterlace ({})", plan.field_order);
    }
    log::debug!(
        "Video stream {} ({}): {}",
        plan.stream_index,
        plan.codec_name,
        if plan.convert { "convert" } else { "copy" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::mocks::MockSampler;
    use crate::processing::deinterlace::FieldCounts;

    fn inventory(streams: Vec<StreamDescriptor>) -> StreamInventory {
        StreamInventory::new("/media/in.mkv", Some(5400.0), streams)
    }

    #[test]
    fn test_h264_copy_without_sampling() {
        let inv = inventory(vec![
            StreamDescriptor::video(0, "h264", 1920, 1080),
            StreamDescriptor::audio(1, "aac", 2, None),
        ]);
        let sampler = MockSampler::new();
        let plan = build_video_plan(&inv, &TranscodeOptions::default(), &PlanConfig::default(), &sampler)
            .unwrap();

        assert!(!plan.convert);
        assert_eq!(plan.field_order, FieldOrder::NotEvaluated);
        assert!(sampler.calls().is_empty());
    }

    #[test]
    fn test_non_h264_is_converted() {
        let inv = inventory(vec![StreamDescriptor::video(0, "mpeg2video", 720, 480)]);
        let plan = build_video_plan(
            &inv,
            &TranscodeOptions::default(),
            &PlanConfig::default(),
            &MockSampler::new(),
        )
        .unwrap();
        assert!(plan.convert);
        assert_eq!(plan.crop, None);
    }

    #[test]
    fn test_no_video_stream() {
        let mut poster = StreamDescriptor::video(1, "mjpeg", 600, 900);
        poster.attached_pic = true;
        let inv = inventory(vec![StreamDescriptor::audio(0, "aac", 2, None), poster]);
        let result = build_video_plan(
            &inv,
            &TranscodeOptions::default(),
            &PlanConfig::default(),
            &MockSampler::new(),
        );
        assert!(matches!(result, Err(CoreError::NoVideoStream)));
    }

    #[test]
    fn test_prefers_first_h264_stream() {
        let inv = inventory(vec![
            StreamDescriptor::video(0, "mpeg4", 640, 480),
            StreamDescriptor::video(2, "h264", 1280, 720),
            StreamDescriptor::video(3, "h264", 1920, 1080),
        ]);
        let plan = build_video_plan(
            &inv,
            &TranscodeOptions::default(),
            &PlanConfig::default(),
            &MockSampler::new(),
        )
        .unwrap();
        assert_eq!(plan.stream_index, 2);
    }

    #[test]
    fn test_letterbox_crop_and_scale() {
        let inv = inventory(vec![StreamDescriptor::video(0, "h264", 1920, 1080)]);
        let sampler = MockSampler::new().with_crops(vec![
            Geometry::new(0, 142, 1920, 796),
            Geometry::new(0, 140, 1920, 800),
        ]);
        let options = TranscodeOptions {
            allow_crop: true,
            max_height: Some(720),
            ..Default::default()
        };
        let plan = build_video_plan(&inv, &options, &PlanConfig::default(), &sampler).unwrap();

        assert!(plan.convert);
        assert_eq!(plan.crop, Some(Geometry::new(0, 140, 1920, 800)));
        assert_eq!(plan.scale, Some(Dimensions::new(1280, 534)));
        assert_eq!(plan.output_dimensions(), Dimensions::new(1280, 534));
        // 5400 s is 22 whole intervals, so 21 interior seek points.
        assert_eq!(sampler.calls(), vec![("crop", 0, 21)]);
    }

    #[test]
    fn test_interlaced_source_is_converted() {
        let inv = inventory(vec![StreamDescriptor::video(0, "h264", 1920, 1080)]);
        let sampler = MockSampler::new().with_field_counts(vec![FieldCounts::new(950, 0, 20, 10)]);
        let options = TranscodeOptions {
            deinterlace: true,
            ..Default::default()
        };
        let plan = build_video_plan(&inv, &options, &PlanConfig::default(), &sampler).unwrap();
        assert_eq!(plan.field_order, FieldOrder::Tff);
        assert!(plan.deinterlace);
        assert!(plan.convert);
    }

    #[test]
    fn test_forced_field_order_skips_idet() {
        let inv = inventory(vec![StreamDescriptor::video(0, "h264", 1920, 1080)]);
        let sampler = MockSampler::new();
        let options = TranscodeOptions {
            deinterlace: true,
            forced_field_order: Some(FieldOrder::Progressive),
            ..Default::default()
        };
        let plan = build_video_plan(&inv, &options, &PlanConfig::default(), &sampler).unwrap();
        assert_eq!(plan.field_order, FieldOrder::Progressive);
        assert!(!plan.convert);
        assert!(sampler.calls().is_empty());
    }

    #[test]
    fn test_sample_counts() {
        assert_eq!(sample_count_for(None, 240.0), 0);
        assert_eq!(sample_count_for(Some(300.0), 240.0), 0);
        assert_eq!(sample_count_for(Some(480.0), 240.0), 1);
        assert_eq!(sample_count_for(Some(1000.0), 240.0), 3);
    }
}
