//! Filesystem workspace rooted at a local directory.
//!
//! Each project gets its own subdirectory keyed by project id; writes
//! never escape it.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{FilePatch, Workspace};

use super::{extract_file_blocks, is_safe_relative_path};

pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn project_dir(&self, project_id: Uuid) -> PathBuf {
        self.root.join(project_id.to_string())
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    fn extract_files(&self, output: &str) -> Vec<FilePatch> {
        extract_file_blocks(output)
    }

    async fn write_file(&self, project_id: Uuid, path: &str, content: &str) -> DomainResult<()> {
        if !is_safe_relative_path(path) {
            return Err(DomainError::ValidationFailed(format!(
                "unsafe workspace path: {path}"
            )));
        }

        let full_path = self.project_dir(project_id).join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::ExecutionFailed(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        fs::write(&full_path, content).await.map_err(|e| {
            DomainError::ExecutionFailed(format!("failed to write {}: {e}", full_path.display()))
        })?;

        Ok(())
    }
}
