//! keel core library: project data model, layout, fingerprints, errors.
//!
//! - [`types`]: configuration document and its capabilities / plugin instances
//! - [`layout`]: where a project keeps its files on disk
//! - [`migration`] / [`workflow`]: per-file parsing rules
//! - [`hash`]: content fingerprints
//! - [`error`]: [`CoreError`]

pub mod error;
pub mod hash;
pub mod layout;
pub mod migration;
pub mod types;
pub mod workflow;

pub use error::CoreError;
pub use layout::ProjectLayout;
pub use migration::MigrationName;
pub use types::{Capability, CapabilityPayload, ConfigDocument, PluginInstance, ProjectId};
pub use workflow::WorkflowDefinition;
