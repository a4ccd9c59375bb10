// ============================================================================
// curator-core/src/error.rs
// ============================================================================
//
// ERROR HANDLING: Custom Error Types for curator-core
//
// This module defines the error taxonomy for the planning and execution
// pipeline. Decision-layer errors (stream shape, geometry, measurement
// integrity, assembly) are raised before any encoder is spawned; subprocess
// errors are raised from exit codes only.
//
// KEY COMPONENTS:
// - CoreError: Enum of every failure a single file's pipeline can hit
// - CoreResult: Convenience alias
// - Helper constructors for common process failures

use std::io;
use thiserror::Error;

/// Errors produced while planning or executing a transcode for one file.
///
/// Every variant is fatal to the current file's pipeline instance: the caller
/// must not publish any partial output when one of these is returned.
#[derive(Error, Debug)]
pub enum CoreError {
    // ---- Stream inventory ----
    #[error("No video stream found (cover art excluded)")]
    NoVideoStream,

    #[error("No audio stream found")]
    NoAudioStream,

    #[error("Probing failed: {0}")]
    ProbeFailed(String),

    // ---- Decision layer ----
    #[error(
        "No aligned crop box within {delta}px of {width}x{height} (max height {max_height:?})"
    )]
    AlignmentUnsatisfiable {
        width: u32,
        height: u32,
        max_height: Option<u32>,
        delta: u32,
    },

    #[error("Loudness measurement returned {actual} results for {expected} streams")]
    MeasurementCountMismatch { expected: usize, actual: usize },

    #[error("Command assembly failed: {0}")]
    AssemblyError(String),

    // ---- Process execution ----
    #[error("Subprocess '{stage}' failed with exit code {code:?}")]
    SubprocessFailed { stage: String, code: Option<i32> },

    #[error("Failed to start command '{0}': {1}")]
    CommandStart(String, #[source] io::Error),

    #[error("Failed waiting for command '{0}': {1}")]
    CommandWait(String, #[source] io::Error),

    #[error("Required tool not found: {0}")]
    DependencyNotFound(String),

    // ---- Ambient ----
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonParseError(String),

    #[error("Invalid path: {0}")]
    PathError(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Output verification failed: {0}")]
    VerificationFailed(String),
}

/// Result alias used throughout curator-core.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::JsonParseError(err.to_string())
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        CoreError::Config(err.to_string())
    }
}

/// Builds a `CommandStart` error for the named command.
pub fn command_start_error(cmd: impl Into<String>, err: io::Error) -> CoreError {
    CoreError::CommandStart(cmd.into(), err)
}

/// Builds a `CommandWait` error for the named command.
pub fn command_wait_error(cmd: impl Into<String>, err: io::Error) -> CoreError {
    CoreError::CommandWait(cmd.into(), err)
}

/// Builds a `SubprocessFailed` error from an exit status.
pub fn subprocess_failed_error(
    stage: impl Into<String>,
    status: std::process::ExitStatus,
) -> CoreError {
    CoreError::SubprocessFailed {
        stage: stage.into(),
        code: status.code(),
    }
}

impl CoreError {
    /// True for faults detected before any subprocess was spawned.
    pub fn is_decision_error(&self) -> bool {
        matches!(
            self,
            CoreError::NoVideoStream
                | CoreError::NoAudioStream
                | CoreError::AlignmentUnsatisfiable { .. }
                | CoreError::AssemblyError(_)
                | CoreError::Config(_)
                | CoreError::PathError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::MeasurementCountMismatch {
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Loudness measurement returned 1 results for 2 streams"
        );

        let err = CoreError::SubprocessFailed {
            stage: "ffmpeg (encode)".to_string(),
            code: Some(1),
        };
        assert!(err.to_string().contains("ffmpeg (encode)"));
    }

    #[test]
    fn test_decision_errors_are_classified() {
        assert!(CoreError::NoVideoStream.is_decision_error());
        assert!(CoreError::AssemblyError("x".into()).is_decision_error());
        assert!(CoreError::PathError("out.mp4".into()).is_decision_error());
        assert!(
            !CoreError::SubprocessFailed {
                stage: "ffmpeg".into(),
                code: Some(1)
            }
            .is_decision_error()
        );
    }
}
