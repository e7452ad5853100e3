//! The remote side, seen from the engine.
//!
//! A [`RemoteGateway`] executes exactly one remote operation per call and owns
//! every protocol concern. The engine never retries a failed call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keel_core::{ProjectId, WorkflowDefinition};
use keel_patch::ConfigPatch;

use crate::page::Page;

/// A structured rejection of one remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A project as listed by the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProject {
    pub id: ProjectId,
    pub name: String,
}

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn apply_config_patch(
        &self,
        project: &ProjectId,
        patch: &ConfigPatch,
    ) -> Result<(), RemoteError>;

    // -- migrations, keyed by file name --------------------------------------

    async fn create_migration(
        &self,
        project: &ProjectId,
        file_name: &str,
        content: &[u8],
    ) -> Result<(), RemoteError>;

    async fn update_migration(
        &self,
        project: &ProjectId,
        file_name: &str,
        content: &[u8],
    ) -> Result<(), RemoteError>;

    async fn delete_migration(&self, project: &ProjectId, file_name: &str)
        -> Result<(), RemoteError>;

    // -- functions and their files -------------------------------------------

    async fn create_function(&self, project: &ProjectId, name: &str) -> Result<(), RemoteError>;

    async fn delete_function(&self, project: &ProjectId, name: &str) -> Result<(), RemoteError>;

    async fn create_function_file(
        &self,
        project: &ProjectId,
        function: &str,
        server_path: &str,
        content: &[u8],
    ) -> Result<(), RemoteError>;

    async fn update_function_file(
        &self,
        project: &ProjectId,
        function: &str,
        server_path: &str,
        content: &[u8],
    ) -> Result<(), RemoteError>;

    async fn delete_function_file(
        &self,
        project: &ProjectId,
        function: &str,
        server_path: &str,
    ) -> Result<(), RemoteError>;

    // -- workflows, keyed by name ----------------------------------------------

    async fn create_workflow(
        &self,
        project: &ProjectId,
        workflow: &WorkflowDefinition,
    ) -> Result<(), RemoteError>;

    async fn update_workflow(
        &self,
        project: &ProjectId,
        workflow: &WorkflowDefinition,
    ) -> Result<(), RemoteError>;

    async fn delete_workflow(&self, project: &ProjectId, name: &str) -> Result<(), RemoteError>;

    // -- listing ---------------------------------------------------------------

    /// One page of the caller's projects, starting at `cursor`.
    async fn list_projects(&self, cursor: Option<&str>) -> Result<Page<RemoteProject>, RemoteError>;
}
