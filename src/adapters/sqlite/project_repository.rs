//! SQLite implementation of the ProjectRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{GateId, Project, ProjectCategory};
use crate::domain::ports::ProjectRepository;

use super::{parse_datetime, parse_optional_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn insert(&self, project: &Project) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO projects (id, name, category, owner, current_gate, current_phase, created_at, updated_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(project.id.to_string())
        .bind(&project.name)
        .bind(project.category.as_str())
        .bind(&project.owner)
        .bind(project.current_gate.as_str())
        .bind(&project.current_phase)
        .bind(project.created_at.to_rfc3339())
        .bind(project.updated_at.to_rfc3339())
        .bind(project.completed_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(
            "SELECT id, name, category, owner, current_gate, current_phase, created_at, updated_at, completed_at FROM projects WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn update(&self, project: &Project) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE projects SET name = ?, category = ?, owner = ?, current_gate = ?,
               current_phase = ?, updated_at = ?, completed_at = ?
               WHERE id = ?"#,
        )
        .bind(&project.name)
        .bind(project.category.as_str())
        .bind(&project.owner)
        .bind(project.current_gate.as_str())
        .bind(&project.current_phase)
        .bind(project.updated_at.to_rfc3339())
        .bind(project.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(project.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ProjectNotFound(project.id));
        }

        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            "SELECT id, name, category, owner, current_gate, current_phase, created_at, updated_at, completed_at FROM projects ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    name: String,
    category: String,
    owner: String,
    current_gate: String,
    current_phase: String,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = DomainError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        let category = ProjectCategory::from_str(&row.category).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid category: {}", row.category))
        })?;

        let current_gate = GateId::from_str(&row.current_gate).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid gate id: {}", row.current_gate))
        })?;

        Ok(Project {
            id: parse_uuid(&row.id)?,
            name: row.name,
            category,
            owner: row.owner,
            current_gate,
            current_phase: row.current_phase,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup_test_repo() -> SqliteProjectRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteProjectRepository::new(pool)
    }

    fn sample_project() -> Project {
        Project::new(
            "checkout-service",
            ProjectCategory::Standard,
            "alice",
            GateId::G1,
            "Requirements",
        )
    }

    #[tokio::test]
    async fn test_insert_and_get_project() {
        let repo = setup_test_repo().await;
        let project = sample_project();

        repo.insert(&project).await.unwrap();

        let retrieved = repo.get(project.id).await.unwrap().unwrap();
        assert_eq!(retrieved.name, "checkout-service");
        assert_eq!(retrieved.category, ProjectCategory::Standard);
        assert_eq!(retrieved.current_gate, GateId::G1);
        assert!(retrieved.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_update_advances_pointer() {
        let repo = setup_test_repo().await;
        let mut project = sample_project();
        repo.insert(&project).await.unwrap();

        project.advance_to(GateId::G2, "Specification");
        repo.update(&project).await.unwrap();

        let retrieved = repo.get(project.id).await.unwrap().unwrap();
        assert_eq!(retrieved.current_gate, GateId::G2);
        assert_eq!(retrieved.current_phase, "Specification");
    }

    #[tokio::test]
    async fn test_update_missing_project_fails() {
        let repo = setup_test_repo().await;
        let project = sample_project();

        let err = repo.update(&project).await.unwrap_err();
        assert!(matches!(err, DomainError::ProjectNotFound(_)));
    }

    #[tokio::test]
    async fn test_completed_at_round_trips() {
        let repo = setup_test_repo().await;
        let mut project = sample_project();
        repo.insert(&project).await.unwrap();

        project.mark_complete();
        repo.update(&project).await.unwrap();

        let retrieved = repo.get(project.id).await.unwrap().unwrap();
        assert!(retrieved.is_complete());
        assert_eq!(retrieved.current_gate, GateId::Complete);
    }

    #[tokio::test]
    async fn test_list_orders_by_creation() {
        let repo = setup_test_repo().await;
        let first = sample_project();
        let second = Project::new(
            "billing-service",
            ProjectCategory::Hybrid,
            "bob",
            GateId::G1,
            "Requirements",
        );

        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
