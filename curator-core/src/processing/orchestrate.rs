// ============================================================================
// curator-core/src/processing/orchestrate.rs
// ============================================================================
//
// PER-FILE PIPELINE: Probe, plan, encode and verify one source file
//
// This module drives the whole decision and execution sequence for a single
// source file. It is strictly sequential; concurrency across files is bounded
// by the shared EncodeGate, which every instance acquires just before its
// encoder runs.
//
// KEY COMPONENTS:
// - Collaborators: the prober, sampler, loudness meter and pipeline runner
// - plan_file: decision stages only (dry run)
// - process_file: plan, encode into a temporary file, verify, publish
// - ProcessOutcome: what a successful run produced
//
// WORKFLOW:
// 1. Probe the source and reject files without video or audio
// 2. Build the video plan (sampling crop and field order when requested)
// 3. Build the audio plan and measure loudness, retrying failed runs
// 4. Assemble the encode pipeline and wait for an encode slot
// 5. Encode into a staging file (configured temp dir, else next to the output)
// 6. Re-probe the result and check its track counts
// 7. Move it into place and extract bitmap subtitles to a sidecar
//
// Any failure aborts the file: the source is never touched and nothing is
// left at the output path.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use crate::config::{PlanConfig, TranscodeOptions};
use crate::encoding::{assemble, sidecar_path, sidecar_stage};
use crate::error::{CoreError, CoreResult};
use crate::external::{
    CommandPipeline, CrateFfprobeExecutor, FfmpegFrameSampler, FfmpegLoudnessMeter, FrameSampler,
    LoudnessMeter, MediaProber, PipelineRunner, ProcessPipelineRunner, SidecarSpawner,
};
use crate::library::file_ident;
use crate::processing::audio_plan::AudioPlan;
use crate::processing::plan::{SubtitlePlan, TranscodePlan};
use crate::processing::video_plan::build_video_plan;
use crate::util::{EncodeGate, RetryPolicy};

/// External collaborators used by one pipeline instance.
pub struct Collaborators<P, F, L, R> {
    pub prober: P,
    pub sampler: F,
    pub meter: L,
    pub runner: R,
}

/// Collaborators backed by the real ffprobe/ffmpeg binaries.
pub type SystemCollaborators = Collaborators<
    CrateFfprobeExecutor,
    FfmpegFrameSampler<SidecarSpawner>,
    FfmpegLoudnessMeter<ProcessPipelineRunner>,
    ProcessPipelineRunner,
>;

impl SystemCollaborators {
    pub fn system(config: &PlanConfig) -> Self {
        Collaborators {
            prober: CrateFfprobeExecutor::new(),
            sampler: FfmpegFrameSampler::new(SidecarSpawner, config),
            meter: FfmpegLoudnessMeter::new(ProcessPipelineRunner::new(), config.ffmpeg_path.clone()),
            runner: ProcessPipelineRunner::new(),
        }
    }
}

/// Result of a successful `process_file` run.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub plan: TranscodePlan,
    pub output: PathBuf,
    /// Bitmap subtitle sidecar, when the source had any
    pub sidecar: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Errors worth another measurement attempt: subprocess and I/O faults.
fn is_transient(err: &CoreError) -> bool {
    matches!(
        err,
        CoreError::SubprocessFailed { .. }
            | CoreError::CommandStart(..)
            | CoreError::CommandWait(..)
            | CoreError::Io(_)
    )
}

/// Runs the decision stages for `source` and returns the finished plan.
///
/// Stream-shape faults are reported before any sampling or measurement
/// subprocess is started.
pub fn plan_file<P, F, L, R>(
    config: &PlanConfig,
    options: &TranscodeOptions,
    source: &Path,
    collaborators: &Collaborators<P, F, L, R>,
) -> CoreResult<TranscodePlan>
where
    P: MediaProber,
    F: FrameSampler,
    L: LoudnessMeter,
    R: PipelineRunner,
{
    let ident = file_ident(source);
    let inventory = collaborators.prober.probe(source)?;
    debug!(
        "{ident} Probed {} stream(s), duration {:?}",
        inventory.streams.len(),
        inventory.duration_secs
    );

    if inventory.video_streams().is_empty() {
        return Err(CoreError::NoVideoStream);
    }
    let mut audio = AudioPlan::build(&inventory.streams, options.keep_other_audio)?;
    let video = build_video_plan(&inventory, options, config, &collaborators.sampler)?;

    let measured = audio.measured_streams();
    let policy = RetryPolicy::new(
        config.measurement_retries,
        Duration::from_secs(config.retry_delay_secs),
    );
    let results = policy.run(
        "Loudness measurement",
        || collaborators.meter.measure_loudness(source, &measured),
        is_transient,
    )?;
    audio.apply_loudness(&results, config)?;

    let plan = TranscodePlan {
        source: source.to_path_buf(),
        video,
        audio,
        subtitles: SubtitlePlan::from_inventory(&inventory),
    };
    info!(
        "{ident} Planned video {} and {} audio track(s)",
        if plan.video.convert { "convert" } else { "copy" },
        plan.expected_audio_tracks()
    );
    Ok(plan)
}

/// Plans, encodes and verifies `source`, writing the result to `output`.
pub fn process_file<P, F, L, R>(
    config: &PlanConfig,
    options: &TranscodeOptions,
    source: &Path,
    output: &Path,
    collaborators: &Collaborators<P, F, L, R>,
    gate: &EncodeGate,
) -> CoreResult<ProcessOutcome>
where
    P: MediaProber,
    F: FrameSampler,
    L: LoudnessMeter,
    R: PipelineRunner,
{
    let ident = file_ident(source);
    let started_at = Utc::now();
    let start = Instant::now();
    info!("{ident} Processing {}", source.display());

    let result = ensure_distinct(source, output)
        .and_then(|()| plan_file(config, options, source, collaborators))
        .and_then(|plan| encode_and_publish(config, &ident, plan, output, collaborators, gate));

    match result {
        Ok((plan, sidecar)) => {
            let elapsed = start.elapsed();
            info!("{ident} Finished in {:.1}s: {}", elapsed.as_secs_f64(), output.display());
            Ok(ProcessOutcome {
                plan,
                output: output.to_path_buf(),
                sidecar,
                started_at,
                elapsed,
            })
        }
        Err(e) => {
            if e.is_decision_error() {
                error!("{ident} Rejected before encoding: {e}");
            } else {
                error!("{ident} Failed: {e}");
            }
            Err(e)
        }
    }
}

fn encode_and_publish<P, F, L, R>(
    config: &PlanConfig,
    ident: &str,
    plan: TranscodePlan,
    output: &Path,
    collaborators: &Collaborators<P, F, L, R>,
    gate: &EncodeGate,
) -> CoreResult<(TranscodePlan, Option<PathBuf>)>
where
    P: MediaProber,
    R: PipelineRunner,
{
    let staging = tempfile::Builder::new()
        .prefix(".curator-")
        .suffix(".mp4")
        .tempfile_in(config.staging_dir(output))?;

    let pipeline = assemble(&plan, config, staging.path())?;
    {
        let _permit = gate.acquire();
        info!(
            "{ident} Encoding ({} stage(s), {} encode(s) in flight)",
            pipeline.len(),
            gate.in_flight()
        );
        collaborators.runner.run(&pipeline)?;
    }

    verify_output(&collaborators.prober, staging.path(), &plan)?;
    publish(staging, output)?;

    let sidecar = sidecar_path(output);
    let Some(stage) = sidecar_stage(&config.ffmpeg_path, &plan.source, &plan.subtitles, &sidecar)
    else {
        return Ok((plan, None));
    };
    info!("{ident} Extracting bitmap subtitles to {}", sidecar.display());
    if let Err(e) = collaborators.runner.run(&CommandPipeline::single(stage)) {
        remove_partial(&sidecar);
        remove_partial(output);
        return Err(e);
    }
    Ok((plan, Some(sidecar)))
}

/// Fails when `output` resolves to the same file as `source`.
fn ensure_distinct(source: &Path, output: &Path) -> CoreResult<()> {
    if resolve(source) == resolve(output) {
        return Err(CoreError::PathError(format!(
            "output {} would overwrite its source",
            output.display()
        )));
    }
    Ok(())
}

/// Canonical form of a path whose file may not exist yet.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match (fs::canonicalize(dir), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

/// Moves the verified staging file to `output`, copying when the rename
/// crosses file systems.
fn publish(staging: NamedTempFile, output: &Path) -> CoreResult<()> {
    let Err(failed) = staging.persist(output) else {
        return Ok(());
    };
    warn!(
        "Rename to {} failed ({}); copying instead",
        output.display(),
        failed.error
    );
    if let Err(e) = fs::copy(failed.file.path(), output) {
        remove_partial(output);
        return Err(CoreError::Io(e));
    }
    Ok(())
}

/// Checks the encoded file carries exactly the planned tracks.
fn verify_output<P: MediaProber>(prober: &P, path: &Path, plan: &TranscodePlan) -> CoreResult<()> {
    let inventory = prober.probe(path)?;
    let videos = inventory.video_streams().len();
    if videos != 1 {
        return Err(CoreError::VerificationFailed(format!(
            "expected 1 video track, found {videos}"
        )));
    }
    let audios = inventory.audio_streams().len();
    let expected = plan.expected_audio_tracks();
    if audios != expected {
        return Err(CoreError::VerificationFailed(format!(
            "expected {expected} audio track(s), found {audios}"
        )));
    }
    Ok(())
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            error!("Failed to remove partial output {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::mocks::{MockLoudnessMeter, MockPipelineRunner, MockProber, MockSampler};
    use crate::media::StreamDescriptor;

    type Mocks = Collaborators<MockProber, MockSampler, MockLoudnessMeter, MockPipelineRunner>;

    fn mocks() -> Mocks {
        Collaborators {
            prober: MockProber::new(),
            sampler: MockSampler::new(),
            meter: MockLoudnessMeter::new(),
            runner: MockPipelineRunner::new().creating_outputs(),
        }
    }

    fn quick_config() -> PlanConfig {
        PlanConfig {
            retry_delay_secs: 0,
            ..PlanConfig::default()
        }
    }

    #[test]
    fn test_no_audio_fails_before_sampling() {
        let m = mocks();
        let source = Path::new("/media/in.mkv");
        m.prober.expect_probe(
            source,
            vec![StreamDescriptor::video(0, "h264", 1920, 1080)],
            Some(600.0),
        );
        let options = TranscodeOptions {
            allow_crop: true,
            ..Default::default()
        };
        let result = plan_file(&quick_config(), &options, source, &m);
        assert!(matches!(result, Err(CoreError::NoAudioStream)));
        assert!(m.sampler.calls().is_empty());
        assert!(m.meter.requests().is_empty());
    }

    #[test]
    fn test_measurement_is_retried() {
        let m = mocks();
        let source = Path::new("/media/in.mkv");
        m.prober.expect_probe(
            source,
            vec![
                StreamDescriptor::video(0, "h264", 1920, 1080),
                StreamDescriptor::audio(1, "aac", 2, None),
            ],
            Some(600.0),
        );
        m.meter.push_error(CoreError::SubprocessFailed {
            stage: "ffmpeg (loudness)".into(),
            code: Some(1),
        });
        m.meter.push_results(vec![-19.0]);

        let plan = plan_file(&quick_config(), &TranscodeOptions::default(), source, &m).unwrap();
        assert_eq!(m.meter.requests().len(), 2);
        assert_eq!(plan.audio.tracks[0].decision.gain_db, Some(-4.0));
    }

    #[test]
    fn test_failed_encode_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let m = mocks();
        let source = Path::new("/media/in.mkv");
        m.prober.expect_probe(
            source,
            vec![
                StreamDescriptor::video(0, "h264", 1920, 1080),
                StreamDescriptor::audio(1, "aac", 2, None),
            ],
            None,
        );
        m.meter.push_results(vec![-23.0]);
        m.runner.push_failure("ffmpeg (encode)", 1);

        let result = process_file(
            &quick_config(),
            &TranscodeOptions::default(),
            source,
            &output,
            &m,
            &EncodeGate::new(1),
        );
        assert!(matches!(result, Err(CoreError::SubprocessFailed { .. })));
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
