// ============================================================================
// curator-core/src/encoding/assembler.rs
// ============================================================================
//
// COMMAND ASSEMBLER: Renders a TranscodePlan into an ffmpeg pipeline
//
// The assembler is the only place that knows ffmpeg's argument grammar for
// the final encode. It walks the plan in order (video, audio in plan order,
// text subtitles), allocating input slots as it goes, and prepends the AC-3
// intermediate stage when any audio reference was routed through the pipe.
//
// KEY COMPONENTS:
// - assemble: plan -> CommandPipeline for the final encode
// - ac3_intermediate_stage: the stage feeding multichannel AAC as AC-3
//
// Output layout: one video track, then the audio tracks in plan order
// (copy before convert for a stream that emits both), then text subtitles
// as mov_text. Bitmap subtitles are handled by `subtitles::sidecar_stage`.

use std::path::Path;

use crate::config::PlanConfig;
use crate::encoding::inputs::{ChannelRequest, InputSlots, InputSource, encode_source};
use crate::error::{CoreError, CoreResult};
use crate::external::ffmpeg_builder::VideoFilterChain;
use crate::external::pipeline::{CommandPipeline, CommandStage};
use crate::processing::audio_plan::AudioTrackPlan;
use crate::processing::deinterlace::FieldOrder;
use crate::processing::plan::TranscodePlan;
use crate::processing::video_plan::VideoPlan;

/// Stage label of the final encode, as reported in errors.
pub const ENCODE_STAGE: &str = "ffmpeg (encode)";

/// Stage label of the AC-3 intermediate.
pub const AC3_STAGE: &str = "ffmpeg (ac3 intermediate)";

/// Builds the stage that transcodes `streams` of `source` to AC-3 and
/// writes them to stdout as Matroska, in the given order.
pub fn ac3_intermediate_stage(ffmpeg: &str, source: &Path, streams: &[u32]) -> CommandStage {
    let mut stage = CommandStage::new(AC3_STAGE, ffmpeg);
    stage.args(["-hide_banner", "-nostats", "-v", "error"]);
    stage.args(["-i".to_string(), source.to_string_lossy().into_owned()]);
    for index in streams {
        stage.args(["-map".to_string(), format!("0:{index}")]);
    }
    for position in 0..streams.len() {
        stage.args([format!("-c:a:{position}"), "ac3".to_string()]);
    }
    stage.args(["-vn", "-sn", "-f", "matroska", "-"]);
    stage
}

/// Argument groups of the main encode, concatenated in this order.
#[derive(Default)]
struct EncodeArgs {
    maps: Vec<String>,
    filters: Vec<String>,
    codecs: Vec<String>,
}

impl EncodeArgs {
    fn map(&mut self, spec: String) {
        self.maps.push("-map".to_string());
        self.maps.push(spec);
    }

    fn filter(&mut self, selector: String, graph: String) {
        self.filters.push(selector);
        self.filters.push(graph);
    }

    fn codec<I, T>(&mut self, args: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.codecs.extend(args.into_iter().map(Into::into));
    }
}

/// Renders `plan` into the pipeline writing an MP4 to `output`.
///
/// Fails with `AssemblyError` when the default audio stream has neither a
/// copy nor a convert action; other streams without an action are left out.
pub fn assemble(plan: &TranscodePlan, config: &PlanConfig, output: &Path) -> CoreResult<CommandPipeline> {
    let mut slots = InputSlots::new();
    let mut args = EncodeArgs::default();

    add_video(&mut slots, &mut args, &plan.video, config);

    let mut audio_track = 0usize;
    for track in &plan.audio.tracks {
        audio_track = add_audio(&mut slots, &mut args, track, config, audio_track)?;
    }
    if audio_track == 0 {
        return Err(CoreError::AssemblyError(
            "plan produces no audio output track".to_string(),
        ));
    }

    if plan.subtitles.text.is_empty() {
        args.codec(["-sn"]);
    } else {
        for (n, stream) in plan.subtitles.text.iter().enumerate() {
            let slot = slots.reference(stream.index, InputSource::File, ChannelRequest::Native);
            args.map(slot.map_spec());
            args.codec([
                format!("-c:s:{n}"),
                "mov_text".to_string(),
                format!("-metadata:s:s:{n}"),
                format!("language={}", stream.language),
            ]);
        }
    }

    let mut encode = CommandStage::new(ENCODE_STAGE, config.ffmpeg_path.as_str());
    encode.args(["-hide_banner", "-nostats", "-y"]);
    encode.args(slots.input_args(&plan.source));
    encode.args(args.maps);
    encode.args(args.filters);
    encode.args(args.codecs);
    encode.args(["-movflags", "+faststart", "-f", "mp4"]);
    encode.arg(output.to_string_lossy());

    let mut pipeline = CommandPipeline::new();
    if slots.uses_pipe() {
        pipeline.push(ac3_intermediate_stage(
            &config.ffmpeg_path,
            &plan.source,
            slots.pipe_streams(),
        ));
    }
    pipeline.push(encode);
    log::debug!("Assembled encode pipeline: {}", pipeline.render());
    Ok(pipeline)
}

fn add_video(slots: &mut InputSlots, args: &mut EncodeArgs, video: &VideoPlan, config: &PlanConfig) {
    let slot = slots.reference(video.stream_index, InputSource::File, ChannelRequest::Native);
    args.map(slot.map_spec());

    if !video.convert {
        args.codec(["-c:v:0", "copy"]);
        return;
    }

    let field_order = if video.deinterlace {
        video.field_order
    } else {
        FieldOrder::NotEvaluated
    };
    let chain = VideoFilterChain::new()
        .add_deinterlace(field_order)
        .add_pad(video.pad)
        .add_crop(video.crop)
        .add_scale(video.scale);
    if let Some(graph) = chain.build() {
        args.filter("-filter:v:0".to_string(), graph);
    }
    args.codec([
        "-c:v:0".to_string(),
        "libx264".to_string(),
        "-preset:v:0".to_string(),
        config.x264_preset.clone(),
        "-crf:v:0".to_string(),
        config.x264_crf.to_string(),
    ]);
}

/// Emits the output tracks of one audio stream; returns the next track number.
fn add_audio(
    slots: &mut InputSlots,
    args: &mut EncodeArgs,
    track: &AudioTrackPlan,
    config: &PlanConfig,
    mut next: usize,
) -> CoreResult<usize> {
    let stream = &track.stream;
    let decision = &track.decision;

    if !decision.copy && !decision.convert {
        if decision.is_default {
            return Err(CoreError::AssemblyError(format!(
                "default audio stream {} has neither a copy nor a convert action",
                stream.index
            )));
        }
        log::debug!("Leaving out audio stream {}", stream.index);
        return Ok(next);
    }

    if decision.copy {
        let (source, request) = encode_source(stream, false);
        let slot = slots.reference(stream.index, source, request);
        args.map(slot.map_spec());
        args.codec([format!("-c:a:{next}"), "copy".to_string()]);
        args.codec(language_args(next, &track.language));
        next += 1;
    }

    if decision.convert {
        let (source, request) = encode_source(stream, true);
        let slot = slots.reference(stream.index, source, request);
        args.map(slot.map_spec());
        if let Some(gain) = decision.gain_db {
            args.filter(format!("-filter:a:{next}"), format!("volume={gain:.1}dB"));
        }
        args.codec([format!("-c:a:{next}"), config.aac_encoder.codec_name().to_string()]);
        args.codec(config.aac_encoder.track_args(next));
        if slot.needs_output_downmix(request) {
            args.codec([format!("-ac:a:{next}"), "2".to_string()]);
        }
        args.codec(language_args(next, &track.language));
        next += 1;
    }

    Ok(next)
}

fn language_args(track: usize, language: &str) -> [String; 2] {
    [format!("-metadata:s:a:{track}"), format!("language={language}")]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::StreamDescriptor;
    use crate::processing::audio_plan::AudioPlan;
    use crate::processing::crop_scale::{Dimensions, Geometry};
    use crate::processing::plan::SubtitlePlan;
    use std::path::PathBuf;

    fn copy_video() -> VideoPlan {
        VideoPlan {
            stream_index: 0,
            codec_name: "h264".to_string(),
            source: Dimensions::new(1920, 1080),
            pad: None,
            crop: None,
            scale: None,
            field_order: FieldOrder::NotEvaluated,
            deinterlace: false,
            convert: false,
        }
    }

    fn plan(video: VideoPlan, audio: Vec<StreamDescriptor>, keep_others: bool) -> TranscodePlan {
        TranscodePlan {
            source: PathBuf::from("/media/in.mkv"),
            video,
            audio: AudioPlan::build(&audio, keep_others).unwrap(),
            subtitles: SubtitlePlan::default(),
        }
    }

    fn encode_stage(pipeline: &CommandPipeline) -> &CommandStage {
        pipeline.last().unwrap()
    }

    #[test]
    fn test_remux_only() {
        let plan = plan(copy_video(), vec![StreamDescriptor::audio(1, "aac", 2, Some("eng"))], false);
        let pipeline = assemble(&plan, &PlanConfig::default(), Path::new("/tmp/out.mp4")).unwrap();

        assert_eq!(pipeline.len(), 1);
        let stage = encode_stage(&pipeline);
        assert_eq!(stage.label, ENCODE_STAGE);
        assert!(stage.has_args(&["-i", "/media/in.mkv", "-map", "0:0", "-map", "0:1"]));
        assert!(stage.has_args(&["-c:v:0", "copy"]));
        assert!(stage.has_args(&["-c:a:0", "copy", "-metadata:s:a:0", "language=eng"]));
        assert!(stage.has_args(&["-sn", "-movflags", "+faststart", "-f", "mp4", "/tmp/out.mp4"]));
        assert!(!stage.args.iter().any(|a| a.starts_with("-filter")));
    }

    #[test]
    fn test_video_filter_chain_order() {
        let video = VideoPlan {
            pad: Some(Geometry::new(4, 0, 1928, 1080)),
            crop: Some(Geometry::new(0, 140, 1920, 800)),
            scale: Some(Dimensions::new(1280, 534)),
            field_order: FieldOrder::Tff,
            deinterlace: true,
            convert: true,
            ..copy_video()
        };
        let plan = plan(video, vec![StreamDescriptor::audio(1, "aac", 2, None)], false);
        let pipeline = assemble(&plan, &PlanConfig::default(), Path::new("out.mp4")).unwrap();
        let stage = encode_stage(&pipeline);

        assert!(stage.has_args(&[
            "-filter:v:0",
            "yadif=parity=tff,pad=1928:1080:4:0,crop=1920:800:0:140,scale=1280:534"
        ]));
        assert!(stage.has_args(&["-c:v:0", "libx264", "-preset:v:0", "fast", "-crf:v:0", "20"]));
    }

    #[test]
    fn test_progressive_verdict_adds_no_deinterlace() {
        let video = VideoPlan {
            codec_name: "mpeg2video".to_string(),
            field_order: FieldOrder::Progressive,
            convert: true,
            ..copy_video()
        };
        let plan = plan(video, vec![StreamDescriptor::audio(1, "ac3", 2, None)], false);
        let pipeline = assemble(&plan, &PlanConfig::default(), Path::new("out.mp4")).unwrap();
        let stage = encode_stage(&pipeline);
        assert!(!stage.args.iter().any(|a| a == "-filter:v:0"));
        assert!(stage.has_args(&["-c:v:0", "libx264"]));
    }

    #[test]
    fn test_surround_default_emits_copy_and_stereo_convert() {
        let mut plan = plan(
            copy_video(),
            vec![
                StreamDescriptor::audio(1, "dts", 6, Some("eng")),
                StreamDescriptor::audio(2, "aac", 2, Some("fre")),
            ],
            true,
        );
        plan.audio
            .apply_loudness(&[-19.0, -23.2], &PlanConfig::default())
            .unwrap();
        let pipeline = assemble(&plan, &PlanConfig::default(), Path::new("out.mp4")).unwrap();
        let stage = encode_stage(&pipeline);

        // Inputs: plain file for video, copy and the French track; a stereo
        // decode of the file for the converted DTS track.
        assert!(stage.has_args(&[
            "-i",
            "/media/in.mkv",
            "-request_channels",
            "2",
            "-i",
            "/media/in.mkv"
        ]));
        assert!(stage.has_args(&["-map", "0:0", "-map", "0:1", "-map", "1:1", "-map", "0:2"]));
        assert!(stage.has_args(&["-filter:a:1", "volume=-4.0dB"]));
        assert!(stage.has_args(&["-c:a:0", "copy"]));
        assert!(stage.has_args(&["-c:a:1", "libfdk_aac", "-vbr:a:1", "5", "-cutoff:a:1", "20000"]));
        assert!(stage.has_args(&["-c:a:2", "copy", "-metadata:s:a:2", "language=fre"]));
        assert!(!stage.args.iter().any(|a| a.starts_with("-ac:")));
    }

    #[test]
    fn test_multichannel_aac_routes_through_pipe() {
        let plan = plan(copy_video(), vec![StreamDescriptor::audio(1, "aac", 6, None)], false);
        assert!(plan.audio.needs_aac_to_ac3_pipeline);

        let pipeline = assemble(&plan, &PlanConfig::default(), Path::new("out.mp4")).unwrap();
        assert_eq!(pipeline.len(), 2);

        let pipe = &pipeline.stages()[0];
        assert_eq!(pipe.label, AC3_STAGE);
        assert!(pipe.has_args(&["-map", "0:1", "-c:a:0", "ac3"]));

        let stage = encode_stage(&pipeline);
        assert!(stage.has_args(&["-f", "matroska", "-request_channels", "2", "-i", "-"]));
        assert!(stage.has_args(&["-map", "1:0"]));
        assert!(stage.has_args(&["-c:a:0", "libfdk_aac"]));
        assert!(stage.has_args(&["-metadata:s:a:0", "language=eng"]));
    }

    #[test]
    fn test_pipe_copy_first_forces_output_downmix() {
        let plan = plan(
            copy_video(),
            vec![
                StreamDescriptor::audio(1, "ac3", 6, None),
                StreamDescriptor::audio(2, "aac", 6, Some("ger")),
            ],
            true,
        );
        let mut plan = plan;
        // Stream 2 keeps its copy and also gets a converted stereo track.
        plan.audio.tracks[1].decision.convert = true;

        let pipeline = assemble(&plan, &PlanConfig::default(), Path::new("out.mp4")).unwrap();
        let stage = encode_stage(&pipeline);
        assert!(stage.has_args(&["-f", "matroska", "-i", "-"]));
        // The pipe slot was opened for the native copy, so the convert needs -ac.
        assert!(stage.has_args(&["-ac:a:3", "2"]));
        assert_eq!(pipeline.stages()[0].args.iter().filter(|a| *a == "-map").count(), 1);
    }

    #[test]
    fn test_dropped_other_stream_is_skipped() {
        let plan = plan(
            copy_video(),
            vec![
                StreamDescriptor::audio(1, "ac3", 6, None),
                StreamDescriptor::audio(2, "aac", 2, None),
            ],
            false,
        );
        let pipeline = assemble(&plan, &PlanConfig::default(), Path::new("out.mp4")).unwrap();
        let stage = encode_stage(&pipeline);
        assert!(!stage.has_args(&["-map", "0:2"]));
        assert_eq!(plan.expected_audio_tracks(), 2);
    }

    #[test]
    fn test_default_without_action_is_assembly_error() {
        let mut plan = plan(copy_video(), vec![StreamDescriptor::audio(1, "aac", 2, None)], false);
        plan.audio.tracks[0].decision.copy = false;
        plan.audio.tracks[0].decision.convert = false;
        let result = assemble(&plan, &PlanConfig::default(), Path::new("out.mp4"));
        assert!(matches!(result, Err(CoreError::AssemblyError(_))));
    }

    #[test]
    fn test_text_subtitles_become_mov_text() {
        let mut plan = plan(copy_video(), vec![StreamDescriptor::audio(1, "aac", 2, None)], false);
        plan.subtitles.text = vec![StreamDescriptor::subtitle(3, "subrip", Some("spa"))];
        let pipeline = assemble(&plan, &PlanConfig::default(), Path::new("out.mp4")).unwrap();
        let stage = encode_stage(&pipeline);
        assert!(stage.has_args(&["-map", "0:3"]));
        assert!(stage.has_args(&["-c:s:0", "mov_text", "-metadata:s:s:0", "language=spa"]));
        assert!(!stage.args.iter().any(|a| a == "-sn"));
    }

    #[test]
    fn test_native_aac_encoder() {
        let config = PlanConfig {
            aac_encoder: crate::config::AacEncoder::Native { bitrate_kbps: 160 },
            ..PlanConfig::default()
        };
        let plan = plan(copy_video(), vec![StreamDescriptor::audio(1, "dts", 6, None)], false);
        let pipeline = assemble(&plan, &config, Path::new("out.mp4")).unwrap();
        let stage = encode_stage(&pipeline);
        assert!(stage.has_args(&["-c:a:1", "aac", "-b:a:1", "160k"]));
    }
}
