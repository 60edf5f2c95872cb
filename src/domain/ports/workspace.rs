//! Port for the external file-write capability and code extraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;

/// One file pulled out of agent output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    pub path: String,
    pub content: String,
}

#[async_trait]
pub trait Workspace: Send + Sync {
    /// Extract a file set from raw agent output. Output with no
    /// recognizable files yields an empty vec, not an error.
    fn extract_files(&self, output: &str) -> Vec<FilePatch>;

    /// Persist one file into the project's working area.
    async fn write_file(&self, project_id: Uuid, path: &str, content: &str) -> DomainResult<()>;
}
