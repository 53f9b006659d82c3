//! Descriptors persisted and returned by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use we_domain::WorkflowId;

/// The kind of artifact a file belongs to, matching the four
/// subdirectories under a workflow's run directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Prompts,
    Responses,
    Metadata,
    Logs,
}

impl ArtifactKind {
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Prompts => "prompts",
            Self::Responses => "responses",
            Self::Metadata => "metadata",
            Self::Logs => "logs",
        }
    }
}

/// Descriptor returned by `Save`, `Get`, and `List`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowFile {
    pub id: WorkflowId,
    pub name: String,
    pub filename: String,
    pub path: String,
    pub user_id: String,
    /// The document text as originally supplied to `Save`, with the
    /// embedded schema prefix stripped back off.
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: String,
}

/// On-disk shape of `metadata/workflow.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    pub id: WorkflowId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    pub status: String,
    #[serde(default)]
    pub artifacts: std::collections::HashMap<String, Vec<String>>,
}
