//! `tokio::fs`-backed implementation of `WorkflowStore`.
//!
//! Layout:
//! ```text
//! <root>/<userId>/<timestamp>/
//!   workflow.cue
//!   metadata/workflow.json
//!   prompts/*.txt
//!   responses/*.json
//!   logs/execution_*.log
//! ```
//! A legacy flat layout, `<root>/<userId>/<name>_<timestamp>.cue`, is
//! read but never written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;
use we_domain::WorkflowId;

use crate::error::StoreError;
use crate::model::{ArtifactKind, WorkflowFile, WorkflowMetadata};
use crate::schema::{already_embedded, prepend_schema, strip_schema};
use crate::traits::WorkflowStore;

pub struct FileWorkflowStore {
    root: PathBuf,
}

impl FileWorkflowStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join(user_id)
    }

    fn workflow_dir(&self, user_id: &str, timestamp: &str) -> PathBuf {
        self.user_dir(user_id).join(timestamp)
    }

    async fn io<T>(path: &Path, result: std::io::Result<T>) -> Result<T, StoreError> {
        result.map_err(|source| StoreError::Io { path: path.display().to_string(), source })
    }
}

#[async_trait]
impl WorkflowStore for FileWorkflowStore {
    async fn save(&self, user_id: &str, name: &str, document_text: &str) -> Result<WorkflowFile, StoreError> {
        if already_embedded(document_text) {
            warn!(user_id, name, "document already contains the embedded workflow schema; prepending another copy to match on-disk format");
        }

        let id = WorkflowId::new();
        let now = Utc::now();
        let timestamp = now.format("%Y%m%d_%H%M%S%3f").to_string();
        let dir = self.workflow_dir(user_id, &timestamp);

        Self::io(&dir, tokio::fs::create_dir_all(&dir).await).await?;
        for kind in [ArtifactKind::Prompts, ArtifactKind::Responses, ArtifactKind::Metadata, ArtifactKind::Logs] {
            let sub = dir.join(kind.dir_name());
            Self::io(&sub, tokio::fs::create_dir_all(&sub).await).await?;
        }

        let cue_path = dir.join("workflow.cue");
        let on_disk = prepend_schema(document_text);
        Self::io(&cue_path, tokio::fs::write(&cue_path, &on_disk).await).await?;

        let metadata = WorkflowMetadata {
            id,
            name: name.to_string(),
            created_at: now,
            user_id: user_id.to_string(),
            status: "draft".to_string(),
            artifacts: HashMap::new(),
        };
        let metadata_path = dir.join("metadata").join("workflow.json");
        let metadata_json = serde_json::to_vec_pretty(&metadata)?;
        Self::io(&metadata_path, tokio::fs::write(&metadata_path, metadata_json).await).await?;

        Ok(WorkflowFile {
            id,
            name: name.to_string(),
            filename: "workflow.cue".to_string(),
            path: cue_path.display().to_string(),
            user_id: user_id.to_string(),
            content: document_text.to_string(),
            created_at: now,
            updated_at: now,
            status: "draft".to_string(),
        })
    }

    async fn save_artifact(
        &self,
        user_id: &str,
        workflow_id: &WorkflowId,
        kind: ArtifactKind,
        filename: &str,
        content: &str,
    ) -> Result<String, StoreError> {
        let dir = self.find_workflow_dir(user_id, workflow_id).await?;
        let sub = dir.join(kind.dir_name());
        Self::io(&sub, tokio::fs::create_dir_all(&sub).await).await?;
        let path = sub.join(filename);
        Self::io(&path, tokio::fs::write(&path, content).await).await?;
        Ok(path.display().to_string())
    }

    async fn save_prompt(&self, user_id: &str, workflow_id: &WorkflowId, name: &str, content: &str) -> Result<String, StoreError> {
        let filename = format!("{name}_{}.txt", Utc::now().format("%H%M%S"));
        self.save_artifact(user_id, workflow_id, ArtifactKind::Prompts, &filename, content).await
    }

    async fn save_response(&self, user_id: &str, workflow_id: &WorkflowId, name: &str, content: &str) -> Result<String, StoreError> {
        let filename = format!("{name}_{}.json", Utc::now().format("%H%M%S"));
        self.save_artifact(user_id, workflow_id, ArtifactKind::Responses, &filename, content).await
    }

    async fn save_execution_log(&self, user_id: &str, workflow_id: &WorkflowId, content: &str) -> Result<String, StoreError> {
        let filename = format!("execution_{}.log", Utc::now().format("%Y%m%d_%H%M%S"));
        self.save_artifact(user_id, workflow_id, ArtifactKind::Logs, &filename, content).await
    }

    async fn list(&self, user_id: &str) -> Result<Vec<WorkflowFile>, StoreError> {
        let dir = self.user_dir(user_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir.display().to_string(), source }),
        };

        let mut legacy = Vec::new();
        let mut nested = Vec::new();
        while let Some(entry) = Self::io(&dir, entries.next_entry().await).await? {
            let path = entry.path();
            if path.is_dir() {
                if let Some(file) = self.read_nested_workflow(user_id, &path).await? {
                    nested.push(file);
                }
            } else if path.extension().is_some_and(|ext| ext == "cue") {
                if let Some(file) = self.read_legacy_workflow(user_id, &path).await? {
                    legacy.push(file);
                }
            }
        }

        // Only `Save` writes the nested layout, so a nested entry always
        // wins over a legacy one sharing its id; among two nested entries
        // that collide, the more recently created one wins.
        let mut by_id: HashMap<WorkflowId, (bool, WorkflowFile)> = HashMap::new();
        for file in legacy {
            by_id.insert(file.id, (false, file));
        }
        for file in nested {
            let keep_existing = by_id
                .get(&file.id)
                .is_some_and(|(is_nested, existing)| *is_nested && existing.created_at >= file.created_at);
            if !keep_existing {
                by_id.insert(file.id, (true, file));
            }
        }

        let mut files: Vec<WorkflowFile> = by_id.into_values().map(|(_, file)| file).collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }

    async fn get(&self, user_id: &str, workflow_id: &WorkflowId) -> Result<WorkflowFile, StoreError> {
        self.list(user_id)
            .await?
            .into_iter()
            .find(|f| &f.id == workflow_id)
            .ok_or_else(|| StoreError::NotFound { user_id: user_id.to_string(), workflow_id: *workflow_id })
    }
}

impl FileWorkflowStore {
    async fn find_workflow_dir(&self, user_id: &str, workflow_id: &WorkflowId) -> Result<PathBuf, StoreError> {
        let file = self.get(user_id, workflow_id).await?;
        Ok(PathBuf::from(file.path).parent().map(Path::to_path_buf).unwrap_or_else(|| self.user_dir(user_id)))
    }

    async fn read_nested_workflow(&self, user_id: &str, dir: &Path) -> Result<Option<WorkflowFile>, StoreError> {
        let cue_path = dir.join("workflow.cue");
        let Ok(raw) = tokio::fs::read_to_string(&cue_path).await else {
            return Ok(None);
        };
        let content = strip_schema(&raw).to_string();

        let metadata_path = dir.join("metadata").join("workflow.json");
        let parsed = match tokio::fs::read_to_string(&metadata_path).await {
            Ok(json) => serde_json::from_str::<WorkflowMetadata>(&json).ok(),
            Err(_) => None,
        };

        let file = match parsed {
            Some(metadata) => WorkflowFile {
                id: metadata.id,
                name: metadata.name,
                filename: "workflow.cue".to_string(),
                path: cue_path.display().to_string(),
                user_id: user_id.to_string(),
                content,
                created_at: metadata.created_at,
                updated_at: metadata.created_at,
                status: metadata.status,
            },
            // Unparseable metadata: still return the document with its raw content.
            None => WorkflowFile {
                id: WorkflowId::new(),
                name: dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
                filename: "workflow.cue".to_string(),
                path: cue_path.display().to_string(),
                user_id: user_id.to_string(),
                content,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                status: "draft".to_string(),
            },
        };
        Ok(Some(file))
    }

    async fn read_legacy_workflow(&self, user_id: &str, path: &Path) -> Result<Option<WorkflowFile>, StoreError> {
        let Ok(raw) = tokio::fs::read_to_string(path).await else {
            return Ok(None);
        };
        let content = strip_schema(&raw).to_string();
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let name = stem.rsplit_once('_').map_or(stem.clone(), |(name, _timestamp)| name.to_string());

        Ok(Some(WorkflowFile {
            id: WorkflowId::new(),
            name,
            filename: path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
            path: path.display().to_string(),
            user_id: user_id.to_string(),
            content,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            status: "draft".to_string(),
        }))
    }
}
