//! Port for pipeline task persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskStatus};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert_many(&self, tasks: &[Task]) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Tasks for a project ordered by position (creation order).
    async fn list_for_project(&self, project_id: Uuid) -> DomainResult<Vec<Task>>;

    async fn update_status(&self, id: Uuid, status: TaskStatus) -> DomainResult<()>;

    /// Set the status of every task a role owns within a project. Returns
    /// the number of rows touched.
    async fn set_status_for_role(
        &self,
        project_id: Uuid,
        role: &str,
        status: TaskStatus,
    ) -> DomainResult<u64>;

    async fn count_for_project(&self, project_id: Uuid) -> DomainResult<u64>;
}
