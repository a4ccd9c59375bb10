//! Transcode planning and per-file orchestration.
//!
//! The decision stages are pure apart from their collaborator calls:
//! `crop_scale` and `deinterlace` are plain functions, `video_plan` and
//! `audio_plan` compose them with sampled and measured values, `plan` holds
//! the combined result and `orchestrate` runs everything for one file.

/// Aligned crop/pad/scale solver
pub mod crop_scale;

/// Field-order classification of idet samples
pub mod deinterlace;

/// Default video stream selection and copy/convert decision
pub mod video_plan;

/// Default audio selection, per-stream actions and gain
pub mod audio_plan;

/// Combined per-file plan
pub mod plan;

/// Probe, plan, encode and verify one file
pub mod orchestrate;

pub use audio_plan::{AudioPlan, AudioTrackPlan, StreamDecision};
pub use crop_scale::{CropScale, Dimensions, Geometry};
pub use deinterlace::{FieldCounts, FieldOrder};
pub use orchestrate::{Collaborators, ProcessOutcome, SystemCollaborators, plan_file, process_file};
pub use plan::{ResolutionTier, SubtitlePlan, TranscodePlan};
pub use video_plan::{VideoPlan, build_video_plan};
