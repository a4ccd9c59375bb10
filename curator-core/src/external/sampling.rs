//! Crop and field-order sampling through ffmpeg analysis filters.
//!
//! Each sample is a short `cropdetect` or `idet` run at a seek point; the
//! filters' log lines are parsed into structured values. Aggregation of the
//! samples happens in the plan builders, not here.

use std::path::Path;

use ffmpeg_sidecar::command::FfmpegCommand;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::PlanConfig;
use crate::error::CoreResult;
use crate::external::ffmpeg_builder::FfmpegCommandBuilder;
use crate::external::ffmpeg_executor::{FfmpegSpawner, run_collecting_logs};
use crate::processing::crop_scale::Geometry;
use crate::processing::deinterlace::FieldCounts;

static CROP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"crop=(?P<width>\d+):(?P<height>\d+):(?P<x>\d+):(?P<y>\d+)").expect("valid regex")
});

static IDET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Multi frame detection:\s*TFF:\s*(?P<tff>\d+)\s+BFF:\s*(?P<bff>\d+)\s+Progressive:\s*(?P<prog>\d+)\s+Undetermined:\s*(?P<und>\d+)",
    )
    .expect("valid regex")
});

/// Source of raw crop boxes and field-order counts for one video stream.
///
/// `sample_count` is the number of seek points; zero requests a single pass
/// over the whole file.
pub trait FrameSampler {
    fn sample_crop(
        &self,
        source: &Path,
        stream_index: u32,
        sample_count: usize,
    ) -> CoreResult<Vec<Geometry>>;

    fn sample_field_order(
        &self,
        source: &Path,
        stream_index: u32,
        sample_count: usize,
    ) -> CoreResult<Vec<FieldCounts>>;
}

/// `FrameSampler` running ffmpeg through an `FfmpegSpawner`.
pub struct FfmpegFrameSampler<S: FfmpegSpawner> {
    spawner: S,
    ffmpeg_path: String,
    interval_secs: f64,
    crop_frames: u32,
    idet_frames: u32,
}

impl<S: FfmpegSpawner> FfmpegFrameSampler<S> {
    pub fn new(spawner: S, config: &PlanConfig) -> Self {
        Self {
            spawner,
            ffmpeg_path: config.ffmpeg_path.clone(),
            interval_secs: config.sample_interval_secs,
            crop_frames: config.crop_sample_frames,
            idet_frames: config.idet_sample_frames,
        }
    }

    /// Seek offsets of the sample points; a single `None` for a whole-file pass.
    fn seek_points(&self, sample_count: usize) -> Vec<Option<f64>> {
        if sample_count == 0 {
            return vec![None];
        }
        (1..=sample_count)
            .map(|i| Some(self.interval_secs * i as f64))
            .collect()
    }

    fn analysis_command(
        &self,
        source: &Path,
        stream_index: u32,
        seek: Option<f64>,
        frames: u32,
        filter: &str,
    ) -> FfmpegCommand {
        let mut cmd = FfmpegCommandBuilder::new()
            .with_ffmpeg_path(&self.ffmpeg_path)
            .build();
        if let Some(offset) = seek {
            cmd.args(["-ss", &format!("{offset:.0}")]);
        }
        cmd.input(source.to_string_lossy().as_ref());
        if seek.is_some() {
            cmd.args(["-vframes", &frames.to_string()]);
        }
        cmd.args([
            "-map",
            &format!("0:{stream_index}"),
            "-an",
            "-sn",
            "-vf:0",
            filter,
            "-f",
            "null",
            "-",
        ]);
        cmd
    }
}

impl<S: FfmpegSpawner> FrameSampler for FfmpegFrameSampler<S> {
    fn sample_crop(
        &self,
        source: &Path,
        stream_index: u32,
        sample_count: usize,
    ) -> CoreResult<Vec<Geometry>> {
        let mut boxes = Vec::new();
        for seek in self.seek_points(sample_count) {
            let cmd = self.analysis_command(
                source,
                stream_index,
                seek,
                self.crop_frames,
                "cropdetect=24:1:0",
            );
            let lines = run_collecting_logs(&self.spawner, cmd, "ffmpeg (cropdetect)")?;
            boxes.extend(lines.iter().filter_map(|line| parse_crop_line(line)));
        }
        log::debug!(
            "Collected {} crop samples for {} stream {}",
            boxes.len(),
            source.display(),
            stream_index
        );
        Ok(boxes)
    }

    fn sample_field_order(
        &self,
        source: &Path,
        stream_index: u32,
        sample_count: usize,
    ) -> CoreResult<Vec<FieldCounts>> {
        let mut counts = Vec::new();
        for seek in self.seek_points(sample_count) {
            let cmd = self.analysis_command(source, stream_index, seek, self.idet_frames, "idet");
            let lines = run_collecting_logs(&self.spawner, cmd, "ffmpeg (idet)")?;
            counts.extend(lines.iter().filter_map(|line| parse_idet_line(line)));
        }
        Ok(counts)
    }
}

/// Parses a `crop=w:h:x:y` value out of a cropdetect log line.
pub fn parse_crop_line(line: &str) -> Option<Geometry> {
    let caps = CROP_RE.captures(line)?;
    let field = |name: &str| caps.name(name)?.as_str().parse::<u32>().ok();
    Some(Geometry::new(
        field("x")?,
        field("y")?,
        field("width")?,
        field("height")?,
    ))
}

/// Parses the multi-frame summary of an idet log line.
pub fn parse_idet_line(line: &str) -> Option<FieldCounts> {
    let caps = IDET_RE.captures(line)?;
    let field = |name: &str| caps.name(name)?.as_str().parse::<u64>().ok();
    Some(FieldCounts::new(
        field("tff")?,
        field("bff")?,
        field("prog")?,
        field("und")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::mocks::MockFfmpegSpawner;
    use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};

    fn log_line(line: &str) -> FfmpegEvent {
        FfmpegEvent::Log(LogLevel::Info, line.to_string())
    }

    #[test]
    fn test_parse_crop_line() {
        let line = "[Parsed_cropdetect_0 @ 0x5581] x1:0 x2:1919 y1:140 y2:939 w:1920 h:800 x:0 y:140 pts:4004 t:4.004 crop=1920:800:0:140";
        assert_eq!(parse_crop_line(line), Some(Geometry::new(0, 140, 1920, 800)));
        assert_eq!(parse_crop_line("frame=  20 fps=0.0 q=-0.0"), None);
    }

    #[test]
    fn test_parse_idet_line() {
        let line = "[Parsed_idet_0 @ 0x55d0] Multi frame detection: TFF:   187 BFF:     0 Progressive:    11 Undetermined:     2";
        assert_eq!(parse_idet_line(line), Some(FieldCounts::new(187, 0, 11, 2)));
        let single = "[Parsed_idet_0 @ 0x55d0] Single frame detection: TFF: 1 BFF: 0 Progressive: 2 Undetermined: 3";
        assert_eq!(parse_idet_line(single), None);
    }

    #[test]
    fn test_crop_samples_at_each_seek_point() {
        let spawner = MockFfmpegSpawner::new();
        spawner.add_success_expectation(
            "cropdetect",
            vec![log_line("[Parsed_cropdetect_0] crop=1920:800:0:140")],
        );
        spawner.add_success_expectation(
            "cropdetect",
            vec![log_line("[Parsed_cropdetect_0] crop=1920:816:0:132")],
        );

        let sampler = FfmpegFrameSampler::new(spawner.clone(), &PlanConfig::default());
        let boxes = sampler
            .sample_crop(Path::new("/media/in.mkv"), 0, 2)
            .unwrap();

        assert_eq!(boxes.len(), 2);
        let calls = spawner.get_received_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].windows(2).any(|w| w[0] == "-ss" && w[1] == "240"));
        assert!(calls[1].windows(2).any(|w| w[0] == "-ss" && w[1] == "480"));
        assert!(calls[0].windows(2).any(|w| w[0] == "-vframes" && w[1] == "20"));
    }

    #[test]
    fn test_whole_file_pass_without_seek() {
        let spawner = MockFfmpegSpawner::new();
        spawner.add_success_expectation(
            "idet",
            vec![log_line(
                "Multi frame detection: TFF: 900 BFF: 0 Progressive: 10 Undetermined: 5",
            )],
        );
        let sampler = FfmpegFrameSampler::new(spawner.clone(), &PlanConfig::default());
        let counts = sampler
            .sample_field_order(Path::new("/media/in.mkv"), 0, 0)
            .unwrap();

        assert_eq!(counts, vec![FieldCounts::new(900, 0, 10, 5)]);
        let calls = spawner.get_received_calls();
        assert!(!calls[0].iter().any(|a| a == "-ss"));
    }

    #[test]
    fn test_failed_sample_is_an_error() {
        let spawner = MockFfmpegSpawner::new();
        spawner.add_exit_error_expectation("cropdetect", vec![], 1);
        let sampler = FfmpegFrameSampler::new(spawner, &PlanConfig::default());
        let result = sampler.sample_crop(Path::new("/media/in.mkv"), 0, 0);
        assert!(matches!(
            result,
            Err(crate::error::CoreError::SubprocessFailed { .. })
        ));
    }
}
