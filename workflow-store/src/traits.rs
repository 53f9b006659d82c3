//! Repository-style trait for workflow document and artifact
//! persistence, decoupled from the filesystem-backed implementation.

use async_trait::async_trait;
use we_domain::WorkflowId;

use crate::error::StoreError;
use crate::model::{ArtifactKind, WorkflowFile};

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Persist a new workflow document under `user_id`, embedding the
    /// schema and creating the artifact subdirectories.
    async fn save(&self, user_id: &str, name: &str, document_text: &str) -> Result<WorkflowFile, StoreError>;

    /// Write one artifact file under the workflow's directory.
    async fn save_artifact(
        &self,
        user_id: &str,
        workflow_id: &WorkflowId,
        kind: ArtifactKind,
        filename: &str,
        content: &str,
    ) -> Result<String, StoreError>;

    /// Convenience wrapper over `save_artifact` for a timestamped prompt
    /// file.
    async fn save_prompt(&self, user_id: &str, workflow_id: &WorkflowId, name: &str, content: &str) -> Result<String, StoreError>;

    /// Convenience wrapper over `save_artifact` for a timestamped
    /// response file.
    async fn save_response(&self, user_id: &str, workflow_id: &WorkflowId, name: &str, content: &str) -> Result<String, StoreError>;

    /// Convenience wrapper over `save_artifact` for a timestamped
    /// execution log.
    async fn save_execution_log(&self, user_id: &str, workflow_id: &WorkflowId, content: &str) -> Result<String, StoreError>;

    /// Enumerate every workflow saved under `user_id`, across both the
    /// nested and legacy flat layouts.
    async fn list(&self, user_id: &str) -> Result<Vec<WorkflowFile>, StoreError>;

    /// Look up one workflow by id; a linear scan over `list`.
    async fn get(&self, user_id: &str, workflow_id: &WorkflowId) -> Result<WorkflowFile, StoreError>;
}
