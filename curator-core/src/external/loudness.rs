//! Integrated loudness measurement with ffmpeg's `ebur128` filter.
//!
//! All measured streams are analysed in one pass: each stream gets its own
//! `ebur128` chain inside a single `-filter_complex` graph, so the filter
//! instance number in the log identifies the stream the summary belongs to.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::encoding::assembler::ac3_intermediate_stage;
use crate::encoding::inputs::{InputSlots, measurement_source};
use crate::error::CoreResult;
use crate::external::pipeline::{CommandPipeline, CommandStage, PipelineRunner};
use crate::media::StreamDescriptor;

static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[Parsed_ebur128_(?P<instance>\d+) @ [^\]]+\] Summary:\s+Integrated loudness:\s+I:\s+(?P<lufs>-?\d+(?:\.\d+)?) LUFS",
    )
    .expect("valid regex")
});

/// Measures integrated loudness (LUFS) of audio streams.
///
/// Results are returned in the order the streams were submitted.
pub trait LoudnessMeter {
    fn measure_loudness(&self, source: &Path, streams: &[StreamDescriptor]) -> CoreResult<Vec<f64>>;
}

/// `LoudnessMeter` running an ffmpeg measurement pipeline.
pub struct FfmpegLoudnessMeter<R: PipelineRunner> {
    runner: R,
    ffmpeg_path: String,
}

impl<R: PipelineRunner> FfmpegLoudnessMeter<R> {
    pub fn new(runner: R, ffmpeg_path: impl Into<String>) -> Self {
        Self {
            runner,
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl<R: PipelineRunner> LoudnessMeter for FfmpegLoudnessMeter<R> {
    fn measure_loudness(&self, source: &Path, streams: &[StreamDescriptor]) -> CoreResult<Vec<f64>> {
        if streams.is_empty() {
            return Ok(Vec::new());
        }
        let pipeline = measurement_pipeline(&self.ffmpeg_path, source, streams);
        let output = self.runner.run(&pipeline)?;
        let results = parse_integrated_loudness(&output.stderr);
        for (stream, lufs) in streams.iter().zip(&results) {
            log::info!("Stream {} has loudness {:+5.1} LUFS", stream.index, lufs);
        }
        Ok(results)
    }
}

/// Builds the measurement pipeline for `streams`.
///
/// Multichannel AAC is measured on a stereo decode of its AC-3 transcode,
/// other multichannel streams on a decoder downmix, the rest natively.
pub fn measurement_pipeline(
    ffmpeg: &str,
    source: &Path,
    streams: &[StreamDescriptor],
) -> CommandPipeline {
    let mut slots = InputSlots::new();
    let mut graph = Vec::with_capacity(streams.len());
    let mut maps = Vec::with_capacity(streams.len() * 2);

    for (n, stream) in streams.iter().enumerate() {
        let (input, request) = measurement_source(stream);
        let slot = slots.reference(stream.index, input, request);
        let downmix = if slot.needs_output_downmix(request) {
            "aformat=channel_layouts=stereo,"
        } else {
            ""
        };
        graph.push(format!(
            "[{}]{downmix}ebur128=framelog=verbose[m{n}]",
            slot.map_spec()
        ));
        maps.push("-map".to_string());
        maps.push(format!("[m{n}]"));
    }

    let mut pipeline = CommandPipeline::new();
    if slots.uses_pipe() {
        pipeline.push(ac3_intermediate_stage(ffmpeg, source, slots.pipe_streams()));
    }

    let mut measure = CommandStage::new("ffmpeg (loudness)", ffmpeg);
    measure.args(["-hide_banner", "-nostats"]);
    measure.args(slots.input_args(source));
    measure.args(["-filter_complex".to_string(), graph.join(";")]);
    measure.args(maps);
    measure.args(["-f", "null", "-"]);
    pipeline.push(measure);
    pipeline
}

/// Extracts every `Integrated loudness` summary, ordered by filter instance.
pub fn parse_integrated_loudness(stderr: &str) -> Vec<f64> {
    let mut found: Vec<(usize, f64)> = SUMMARY_RE
        .captures_iter(stderr)
        .filter_map(|caps| {
            let instance = caps.name("instance")?.as_str().parse().ok()?;
            let lufs = caps.name("lufs")?.as_str().parse().ok()?;
            Some((instance, lufs))
        })
        .collect();
    found.sort_by_key(|(instance, _)| *instance);
    found.into_iter().map(|(_, lufs)| lufs).collect()
}
