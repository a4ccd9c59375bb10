//! Rendering of transcode plans into ffmpeg command pipelines.
//!
//! `inputs` allocates the encoder's `-i` slots, `assembler` renders the
//! final encode and `subtitles` the bitmap subtitle sidecar.

pub mod assembler;
pub mod inputs;
pub mod subtitles;

pub use assembler::{AC3_STAGE, ENCODE_STAGE, ac3_intermediate_stage, assemble};
pub use inputs::{ChannelRequest, InputSlots, InputSource, SlotRef};
pub use subtitles::{SIDECAR_STAGE, sidecar_path, sidecar_stage};
