//! Store-level errors. All failure modes are I/O-shaped; nothing is
//! ever silently swallowed.

use we_domain::WorkflowId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("filesystem error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize workflow metadata: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("workflow '{workflow_id}' not found for user '{user_id}'")]
    NotFound { user_id: String, workflow_id: WorkflowId },
}
