//! Content-addressed persistence for workflow documents and their
//! per-run artifacts (prompts, responses, execution logs, metadata).

pub mod error;
pub mod fs_store;
pub mod model;
pub mod schema;
pub mod traits;

pub use error::StoreError;
pub use fs_store::FileWorkflowStore;
pub use model::{ArtifactKind, WorkflowFile, WorkflowMetadata};
pub use traits::WorkflowStore;

#[cfg(test)]
mod tests {
    use super::*;
    use we_domain::WorkflowId;

    async fn temp_store() -> (FileWorkflowStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (FileWorkflowStore::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn save_then_get_round_trips_content() {
        let (store, _dir) = temp_store().await;
        let document = "workflow:\n  name: Send Report\n  steps: []\n";
        let saved = store.save("user-1", "Send Report", document).await.unwrap();

        let fetched = store.get("user-1", &saved.id).await.unwrap();
        assert_eq!(fetched.content, document);
        assert_eq!(fetched.status, "draft");
    }

    #[tokio::test]
    async fn save_creates_all_artifact_subdirectories() {
        let (store, dir) = temp_store().await;
        let saved = store.save("user-1", "W", "workflow:\n  name: W\n").await.unwrap();
        let workflow_dir = std::path::Path::new(&saved.path).parent().unwrap();
        assert!(workflow_dir.join("prompts").is_dir());
        assert!(workflow_dir.join("responses").is_dir());
        assert!(workflow_dir.join("metadata").is_dir());
        assert!(workflow_dir.join("logs").is_dir());
        drop(dir);
    }

    #[tokio::test]
    async fn save_prompt_writes_under_prompts_dir() {
        let (store, _dir) = temp_store().await;
        let saved = store.save("user-1", "W", "workflow:\n  name: W\n").await.unwrap();
        let path = store.save_prompt("user-1", &saved.id, "intent", "analyze this").await.unwrap();
        assert!(path.contains("/prompts/"));
        assert!(path.ends_with(".txt"));
    }

    #[tokio::test]
    async fn list_returns_nested_and_legacy_layouts() {
        let (store, dir) = temp_store().await;
        store.save("user-1", "Nested", "workflow:\n  name: Nested\n").await.unwrap();

        let user_dir = dir.path().join("user-1");
        tokio::fs::write(user_dir.join("Legacy_20250101120000.cue"), "workflow:\n  name: Legacy\n").await.unwrap();

        let files = store.list("user-1").await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.name == "Nested"));
        assert!(files.iter().any(|f| f.name == "Legacy"));
    }

    #[tokio::test]
    async fn list_sorts_by_created_at_descending() {
        let (store, dir) = temp_store().await;
        let user_dir = dir.path().join("user-1");

        write_nested_fixture(&user_dir, "20250101_000000", "Older", "2025-01-01T00:00:00Z").await;
        write_nested_fixture(&user_dir, "20250601_000000", "Newer", "2025-06-01T00:00:00Z").await;

        let files = store.list("user-1").await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "Newer");
        assert_eq!(files[1].name, "Older");
    }

    #[tokio::test]
    async fn list_dedups_entries_sharing_the_same_workflow_id() {
        // A legacy flat file carries no persisted id of its own (it's
        // assigned a fresh one on every `list`), so the only way two
        // entries legitimately collide on id today is two nested
        // directories pointing at the same workflow id — e.g. a stray
        // duplicate `metadata/workflow.json`. The newer directory (later
        // timestamp) is the one that should survive.
        let (store, dir) = temp_store().await;
        let user_dir = dir.path().join("user-1");

        let id = we_domain::WorkflowId::new();
        write_nested_fixture_with_id(&user_dir, "20250101_000000", "Shared-old", "2025-01-01T00:00:00Z", id).await;
        write_nested_fixture_with_id(&user_dir, "20250601_000000", "Shared-new", "2025-06-01T00:00:00Z", id).await;

        let files = store.list("user-1").await.unwrap();
        assert_eq!(files.len(), 1, "two entries sharing a workflow id must collapse into one");
        assert_eq!(files[0].id, id);
    }

    async fn write_nested_fixture(user_dir: &std::path::Path, timestamp: &str, name: &str, created_at: &str) {
        write_nested_fixture_with_id(user_dir, timestamp, name, created_at, we_domain::WorkflowId::new()).await;
    }

    async fn write_nested_fixture_with_id(
        user_dir: &std::path::Path,
        timestamp: &str,
        name: &str,
        created_at: &str,
        id: we_domain::WorkflowId,
    ) {
        let dir = user_dir.join(timestamp);
        tokio::fs::create_dir_all(dir.join("metadata")).await.unwrap();
        tokio::fs::write(dir.join("workflow.cue"), format!("workflow:\n  name: {name}\n")).await.unwrap();
        let metadata = model::WorkflowMetadata {
            id,
            name: name.to_string(),
            created_at: created_at.parse().unwrap(),
            user_id: "user-1".to_string(),
            status: "draft".to_string(),
            artifacts: std::collections::HashMap::new(),
        };
        tokio::fs::write(dir.join("metadata").join("workflow.json"), serde_json::to_vec(&metadata).unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn get_unknown_workflow_is_not_found() {
        let (store, _dir) = temp_store().await;
        let result = store.get("user-1", &WorkflowId::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_for_unknown_user_is_empty() {
        let (store, _dir) = temp_store().await;
        let files = store.list("nobody").await.unwrap();
        assert!(files.is_empty());
    }
}
