//! SQLite implementation of the HandoffRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Handoff, HandoffStatus};
use crate::domain::ports::HandoffRepository;

use super::{parse_datetime, parse_json_or_default, parse_uuid};

#[derive(Clone)]
pub struct SqliteHandoffRepository {
    pool: SqlitePool,
}

impl SqliteHandoffRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HandoffRepository for SqliteHandoffRepository {
    async fn insert(&self, handoff: &Handoff) -> DomainResult<()> {
        let deliverables_json = serde_json::to_string(&handoff.deliverables)?;

        sqlx::query(
            r#"INSERT INTO handoffs (id, project_id, from_role, to_role, phase, status, deliverables, notes, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(handoff.id.to_string())
        .bind(handoff.project_id.to_string())
        .bind(&handoff.from_role)
        .bind(&handoff.to_role)
        .bind(&handoff.phase)
        .bind(handoff.status.as_str())
        .bind(&deliverables_json)
        .bind(&handoff.notes)
        .bind(handoff.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_project(&self, project_id: Uuid) -> DomainResult<Vec<Handoff>> {
        let rows: Vec<HandoffRow> = sqlx::query_as(
            "SELECT id, project_id, from_role, to_role, phase, status, deliverables, notes, created_at FROM handoffs WHERE project_id = ? ORDER BY created_at",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn latest_for_role(
        &self,
        project_id: Uuid,
        to_role: &str,
    ) -> DomainResult<Option<Handoff>> {
        let row: Option<HandoffRow> = sqlx::query_as(
            "SELECT id, project_id, from_role, to_role, phase, status, deliverables, notes, created_at FROM handoffs WHERE project_id = ? AND to_role = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(project_id.to_string())
        .bind(to_role)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct HandoffRow {
    id: String,
    project_id: String,
    from_role: String,
    to_role: String,
    phase: String,
    status: String,
    deliverables: Option<String>,
    notes: String,
    created_at: String,
}

impl TryFrom<HandoffRow> for Handoff {
    type Error = DomainError;

    fn try_from(row: HandoffRow) -> Result<Self, Self::Error> {
        let status = HandoffStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid handoff status: {}", row.status))
        })?;

        Ok(Handoff {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            from_role: row.from_role,
            to_role: row.to_role,
            phase: row.phase,
            status,
            deliverables: parse_json_or_default(row.deliverables)?,
            notes: row.notes,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteProjectRepository};
    use crate::domain::models::{GateId, Project, ProjectCategory};
    use crate::domain::ports::ProjectRepository;

    async fn setup() -> (SqliteHandoffRepository, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let projects = SqliteProjectRepository::new(pool.clone());

        let project = Project::new(
            "checkout-service",
            ProjectCategory::Standard,
            "alice",
            GateId::G3,
            "Design",
        );
        projects.insert(&project).await.unwrap();

        (SqliteHandoffRepository::new(pool), project.id)
    }

    #[tokio::test]
    async fn test_insert_and_list_handoffs() {
        let (repo, project_id) = setup().await;

        let handoff = Handoff::new(project_id, "architect", "backend-developer", "Design")
            .with_deliverables(vec!["architecture-doc".into()])
            .with_notes("schema finalized");
        repo.insert(&handoff).await.unwrap();

        let listed = repo.list_for_project(project_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].deliverables, vec!["architecture-doc".to_string()]);
        assert_eq!(listed[0].status, HandoffStatus::Complete);
    }

    #[tokio::test]
    async fn test_latest_for_role_picks_newest() {
        let (repo, project_id) = setup().await;

        let mut older = Handoff::new(project_id, "architect", "backend-developer", "Design")
            .with_notes("first pass");
        older.created_at = chrono::Utc::now() - chrono::Duration::minutes(10);
        repo.insert(&older).await.unwrap();

        let newer = Handoff::new(project_id, "spec-writer", "backend-developer", "Design")
            .with_notes("revised");
        repo.insert(&newer).await.unwrap();

        let latest = repo
            .latest_for_role(project_id, "backend-developer")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.notes, "revised");
    }

    #[tokio::test]
    async fn test_latest_for_role_missing_returns_none() {
        let (repo, project_id) = setup().await;
        let latest = repo.latest_for_role(project_id, "qa-engineer").await.unwrap();
        assert!(latest.is_none());
    }
}
