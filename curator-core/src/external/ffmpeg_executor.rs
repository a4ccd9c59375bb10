// ============================================================================
// curator-core/src/external/ffmpeg_executor.rs
// ============================================================================
//
// FFMPEG EXECUTOR: Event-streaming ffmpeg process abstraction
//
// Short analysis commands (cropdetect, idet) are run through ffmpeg-sidecar
// so their log output arrives as parsed events. The traits here let the
// sampler be driven by a scripted spawner in tests.
//
// KEY COMPONENTS:
// - FfmpegProcess: an active ffmpeg process yielding events
// - FfmpegSpawner: creates FfmpegProcess instances from commands
// - SidecarSpawner: ffmpeg-sidecar backed implementation
// - run_collecting_logs: spawn, gather log lines, check the exit status

use crate::error::{CoreResult, command_start_error, command_wait_error, subprocess_failed_error};
use ffmpeg_sidecar::child::FfmpegChild as SidecarChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;
use std::io;
use std::process::ExitStatus;

/// An active ffmpeg process instance.
pub trait FfmpegProcess {
    /// Feeds every event of the running command to `handler`.
    fn handle_events<F>(&mut self, handler: F) -> CoreResult<()>
    where
        F: FnMut(FfmpegEvent) -> CoreResult<()>;

    /// Waits for the command to complete and returns its exit status.
    fn wait(&mut self) -> CoreResult<ExitStatus>;
}

/// Something that can spawn an `FfmpegProcess`.
pub trait FfmpegSpawner {
    type Process: FfmpegProcess;
    /// Spawns the ffmpeg command, consuming the command object.
    fn spawn(&self, cmd: FfmpegCommand) -> CoreResult<Self::Process>;
}

/// Wrapper around `ffmpeg_sidecar::child::FfmpegChild`.
pub struct SidecarProcess(SidecarChild);

impl FfmpegProcess for SidecarProcess {
    fn handle_events<F>(&mut self, mut handler: F) -> CoreResult<()>
    where
        F: FnMut(FfmpegEvent) -> CoreResult<()>,
    {
        let iterator = self.0.iter().map_err(|e| {
            log::error!("Failed to get ffmpeg event iterator: {e}");
            command_wait_error("ffmpeg (sidecar events)", io::Error::other(e.to_string()))
        })?;
        for event in iterator {
            handler(event)?;
        }
        Ok(())
    }

    fn wait(&mut self) -> CoreResult<ExitStatus> {
        self.0
            .wait()
            .map_err(|e| command_wait_error("ffmpeg (sidecar)", e))
    }
}

/// `FfmpegSpawner` backed by `ffmpeg-sidecar`.
#[derive(Debug, Clone, Default)]
pub struct SidecarSpawner;

impl FfmpegSpawner for SidecarSpawner {
    type Process = SidecarProcess;

    fn spawn(&self, mut cmd: FfmpegCommand) -> CoreResult<Self::Process> {
        cmd.spawn()
            .map(SidecarProcess)
            .map_err(|e| command_start_error("ffmpeg (sidecar)", e))
    }
}

/// Runs `cmd` to completion and returns its log and error lines.
///
/// A non-zero exit is reported as `SubprocessFailed` for `stage`; no output
/// from a failed run is returned.
pub fn run_collecting_logs<S: FfmpegSpawner>(
    spawner: &S,
    cmd: FfmpegCommand,
    stage: &str,
) -> CoreResult<Vec<String>> {
    log::debug!("Running {stage}: {cmd:?}");
    let mut process = spawner.spawn(cmd)?;
    let mut lines = Vec::new();
    process.handle_events(|event| {
        match event {
            FfmpegEvent::Log(_, line) | FfmpegEvent::Error(line) => lines.push(line),
            _ => {}
        }
        Ok(())
    })?;

    let status = process.wait()?;
    if !status.success() {
        log::error!("{stage} exited with {status}");
        return Err(subprocess_failed_error(stage, status));
    }
    Ok(lines)
}
