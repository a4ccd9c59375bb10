//! Utility functions and helpers module
//!
//! Responsibilities:
//! - Retry external calls a fixed number of times
//! - Bound the number of concurrent heavy encodes across files
//!
//! Both helpers sit at the orchestration layer; the plan builders never
//! retry or block.

pub mod gate;
pub mod retry;

// Re-export commonly used types
pub use gate::{EncodeGate, EncodePermit};
pub use retry::RetryPolicy;
