//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskStatus};
use crate::domain::ports::TaskRepository;

use super::{parse_datetime, parse_optional_uuid, parse_uuid};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn insert_many(&self, tasks: &[Task]) -> DomainResult<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for task in tasks {
            sqlx::query(
                r#"INSERT INTO tasks (id, project_id, description, role, status, parent_id, position, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(task.id.to_string())
            .bind(task.project_id.to_string())
            .bind(&task.description)
            .bind(&task.role)
            .bind(task.status.as_str())
            .bind(task.parent_id.map(|id| id.to_string()))
            .bind(task.position as i64)
            .bind(task.created_at.to_rfc3339())
            .bind(task.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(
            "SELECT id, project_id, description, role, status, parent_id, position, created_at, updated_at FROM tasks WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn list_for_project(&self, project_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT id, project_id, description, role, status, parent_id, position, created_at, updated_at FROM tasks WHERE project_id = ? ORDER BY position",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn update_status(&self, id: Uuid, status: TaskStatus) -> DomainResult<()> {
        let result = sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(id));
        }

        Ok(())
    }

    async fn set_status_for_role(
        &self,
        project_id: Uuid,
        role: &str,
        status: TaskStatus,
    ) -> DomainResult<u64> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, updated_at = ? WHERE project_id = ? AND role = ?",
        )
        .bind(status.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(project_id.to_string())
        .bind(role)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_for_project(&self, project_id: Uuid) -> DomainResult<u64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0 as u64)
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    project_id: String,
    description: String,
    role: String,
    status: String,
    parent_id: Option<String>,
    position: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid task status: {}", row.status))
        })?;

        Ok(Task {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            description: row.description,
            role: row.role,
            status,
            parent_id: parse_optional_uuid(row.parent_id)?,
            position: row.position.max(0) as u32,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteProjectRepository};
    use crate::domain::models::{GateId, Project, ProjectCategory};
    use crate::domain::ports::ProjectRepository;

    async fn setup() -> (SqliteTaskRepository, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let projects = SqliteProjectRepository::new(pool.clone());

        let project = Project::new(
            "checkout-service",
            ProjectCategory::Standard,
            "alice",
            GateId::G1,
            "Requirements",
        );
        projects.insert(&project).await.unwrap();

        (SqliteTaskRepository::new(pool), project.id)
    }

    #[tokio::test]
    async fn test_insert_many_and_list_in_position_order() {
        let (repo, project_id) = setup().await;

        let first = Task::new(project_id, "gather requirements", "requirements-analyst", 0);
        let second = Task::new(project_id, "write spec", "spec-writer", 1).with_parent(first.id);
        repo.insert_many(&[first.clone(), second.clone()]).await.unwrap();

        let listed = repo.list_for_project(project_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].description, "gather requirements");
        assert_eq!(listed[1].parent_id, Some(first.id));

        assert_eq!(repo.count_for_project(project_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_status() {
        let (repo, project_id) = setup().await;

        let task = Task::new(project_id, "gather requirements", "requirements-analyst", 0);
        repo.insert_many(std::slice::from_ref(&task)).await.unwrap();

        repo.update_status(task.id, TaskStatus::InProgress).await.unwrap();

        let retrieved = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(retrieved.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_update_status_missing_task_fails() {
        let (repo, _) = setup().await;
        let err = repo.update_status(Uuid::new_v4(), TaskStatus::Complete).await.unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_set_status_for_role_counts_rows() {
        let (repo, project_id) = setup().await;

        let tasks = vec![
            Task::new(project_id, "implement API", "backend-developer", 0),
            Task::new(project_id, "implement persistence", "backend-developer", 1),
            Task::new(project_id, "build UI", "frontend-developer", 2),
        ];
        repo.insert_many(&tasks).await.unwrap();

        let touched = repo
            .set_status_for_role(project_id, "backend-developer", TaskStatus::Complete)
            .await
            .unwrap();
        assert_eq!(touched, 2);

        let listed = repo.list_for_project(project_id).await.unwrap();
        assert_eq!(listed.iter().filter(|t| t.is_complete()).count(), 2);
    }
}
