//! Core library for media analysis and transcode planning using ffmpeg and ffprobe.
//!
//! This crate inspects a source file's streams, computes a deterministic
//! transcode plan (crop, scale, deinterlace, per-stream audio actions and
//! loudness gain) and renders it into ffmpeg command pipelines.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use curator_core::{EncodeGate, PlanConfig, SystemCollaborators, TranscodeOptions, process_file};
//! use std::path::Path;
//!
//! let config = PlanConfig::default();
//! let options = TranscodeOptions {
//!     allow_crop: true,
//!     max_height: Some(720),
//!     ..Default::default()
//! };
//! let collaborators = SystemCollaborators::system(&config);
//! let gate = EncodeGate::new(config.max_concurrent_encodes);
//!
//! let outcome = process_file(
//!     &config,
//!     &options,
//!     Path::new("/incoming/movie.mkv"),
//!     Path::new("/work/movie.mp4"),
//!     &collaborators,
//!     &gate,
//! ).unwrap();
//! println!("{} audio track(s)", outcome.plan.expected_audio_tracks());
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod external;
pub mod library;
pub mod media;
pub mod processing;
pub mod util;

// Re-exports for public API
pub use config::{AacEncoder, PlanConfig, PlanConfigBuilder, TranscodeOptions};
pub use encoding::assemble;
pub use error::{CoreError, CoreResult};
pub use external::check_dependency;
pub use media::{StreamDescriptor, StreamInventory, StreamKind};
pub use processing::{
    AudioPlan, Collaborators, FieldOrder, ProcessOutcome, ResolutionTier, SystemCollaborators,
    TranscodePlan, VideoPlan, plan_file, process_file,
};
pub use util::{EncodeGate, RetryPolicy};
