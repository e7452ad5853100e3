//! # keel-patch
//!
//! Structural diffing of the configuration document and compilation of the
//! raw edit list into a typed [`ConfigPatch`].
//!
//! Call [`compile`] with the last pushed document and the local one.

pub mod compile;
pub mod diff;
pub mod edit;
pub mod error;
pub mod patch;

pub use compile::compile;
pub use diff::{Differ, Edit, EditOp, Segment};
pub use error::PatchError;
pub use patch::{CapabilityOp, ConfigPatch, InstanceOp};
