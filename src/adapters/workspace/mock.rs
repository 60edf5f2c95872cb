//! In-memory workspace for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{FilePatch, Workspace};

use super::{extract_file_blocks, is_safe_relative_path};

/// Workspace that records writes in memory, keyed by project then path.
pub struct MockWorkspace {
    files: Arc<RwLock<HashMap<Uuid, HashMap<String, String>>>>,
}

impl MockWorkspace {
    pub fn new() -> Self {
        Self { files: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn written_files(&self, project_id: Uuid) -> Vec<String> {
        let files = self.files.read().await;
        let mut paths: Vec<String> = files
            .get(&project_id)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    pub async fn file_content(&self, project_id: Uuid, path: &str) -> Option<String> {
        let files = self.files.read().await;
        files.get(&project_id).and_then(|m| m.get(path)).cloned()
    }

    pub async fn write_count(&self, project_id: Uuid) -> usize {
        let files = self.files.read().await;
        files.get(&project_id).map(|m| m.len()).unwrap_or(0)
    }
}

impl Default for MockWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Workspace for MockWorkspace {
    fn extract_files(&self, output: &str) -> Vec<FilePatch> {
        extract_file_blocks(output)
    }

    async fn write_file(&self, project_id: Uuid, path: &str, content: &str) -> DomainResult<()> {
        if !is_safe_relative_path(path) {
            return Err(DomainError::ValidationFailed(format!(
                "unsafe workspace path: {path}"
            )));
        }

        let mut files = self.files.write().await;
        files
            .entry(project_id)
            .or_default()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }
}
