// ============================================================================
// curator-core/src/external/mod.rs
// ============================================================================
//
// EXTERNAL TOOLS: Collaborators backed by ffprobe and ffmpeg
//
// Everything that touches a subprocess lives behind a trait in this module:
// probing, frame sampling, loudness measurement and pipeline execution. The
// planners and the orchestrator are generic over these traits, so tests can
// script every collaborator without spawning ffmpeg.
//
// KEY COMPONENTS:
// - MediaProber / CrateFfprobeExecutor: stream inventory via the ffprobe crate
// - FrameSampler / FfmpegFrameSampler: cropdetect and idet samples
// - LoudnessMeter / FfmpegLoudnessMeter: one-pass ebur128 measurement
// - PipelineRunner / ProcessPipelineRunner: shell-free multi-stage execution
// - FfmpegSpawner / SidecarSpawner: event-streaming ffmpeg processes
// - FfmpegCommandBuilder / VideoFilterChain: command and filter construction
// - check_dependency: tool availability check

use crate::error::{CoreError, CoreResult};

use std::io;
use std::process::{Command, Stdio};

// ============================================================================
// SUBMODULES
// ============================================================================

pub mod ffmpeg_builder;
pub mod ffmpeg_executor;
pub mod ffprobe_executor;
pub mod loudness;
pub mod pipeline;
pub mod sampling;

#[cfg(any(test, feature = "test-mocks"))]
pub mod mocks;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use ffmpeg_builder::{FfmpegCommandBuilder, VideoFilterChain};
pub use ffmpeg_executor::{FfmpegProcess, FfmpegSpawner, SidecarProcess, SidecarSpawner};
pub use ffprobe_executor::{CrateFfprobeExecutor, MediaProber};
pub use loudness::{FfmpegLoudnessMeter, LoudnessMeter};
pub use pipeline::{
    CommandPipeline, CommandStage, PipelineOutput, PipelineRunner, ProcessPipelineRunner,
};
pub use sampling::{FfmpegFrameSampler, FrameSampler};

// ============================================================================
// DEPENDENCY CHECKING
// ============================================================================

/// Checks that an external command exists and can be started.
///
/// Runs `cmd_name -version` with all output discarded; only a failure to
/// start matters, the exit status is ignored.
pub fn check_dependency(cmd_name: &str) -> CoreResult<()> {
    let result = Command::new(cmd_name)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match result {
        Ok(_) => {
            log::debug!("Found dependency: {cmd_name}");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("Dependency '{cmd_name}' not found.");
            Err(CoreError::DependencyNotFound(cmd_name.to_string()))
        }
        Err(e) => {
            log::error!("Failed to start dependency check command '{cmd_name}': {e}");
            Err(CoreError::CommandStart(cmd_name.to_string(), e))
        }
    }
}
