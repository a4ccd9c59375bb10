//! Probed media representation.
//!
//! The stream inventory is the leaf of the planning pipeline: pure data
//! produced by an external prober and consumed by the plan builders.

pub mod inventory;

pub use inventory::{StreamDescriptor, StreamInventory, StreamKind, UNDETERMINED_LANGUAGE};
