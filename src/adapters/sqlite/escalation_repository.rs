//! SQLite implementation of the EscalationRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Escalation, EscalationSeverity, EscalationStatus};
use crate::domain::ports::EscalationRepository;

use super::{parse_datetime, parse_optional_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteEscalationRepository {
    pool: SqlitePool,
}

impl SqliteEscalationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EscalationRepository for SqliteEscalationRepository {
    async fn insert(&self, escalation: &Escalation) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO escalations (id, project_id, severity, role, summary, status, created_at, resolved_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(escalation.id.to_string())
        .bind(escalation.project_id.to_string())
        .bind(escalation.severity.as_str())
        .bind(&escalation.role)
        .bind(&escalation.summary)
        .bind(escalation.status.as_str())
        .bind(escalation.created_at.to_rfc3339())
        .bind(escalation.resolved_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Escalation>> {
        let row: Option<EscalationRow> = sqlx::query_as(
            "SELECT id, project_id, severity, role, summary, status, created_at, resolved_at FROM escalations WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn list_for_project(
        &self,
        project_id: Uuid,
        status: Option<EscalationStatus>,
    ) -> DomainResult<Vec<Escalation>> {
        let rows: Vec<EscalationRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT id, project_id, severity, role, summary, status, created_at, resolved_at FROM escalations WHERE project_id = ? AND status = ? ORDER BY created_at",
                )
                .bind(project_id.to_string())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT id, project_id, severity, role, summary, status, created_at, resolved_at FROM escalations WHERE project_id = ? ORDER BY created_at",
                )
                .bind(project_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn update(&self, escalation: &Escalation) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE escalations SET severity = ?, summary = ?, status = ?, resolved_at = ? WHERE id = ?",
        )
        .bind(escalation.severity.as_str())
        .bind(&escalation.summary)
        .bind(escalation.status.as_str())
        .bind(escalation.resolved_at.map(|dt| dt.to_rfc3339()))
        .bind(escalation.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::EscalationNotFound(escalation.id));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct EscalationRow {
    id: String,
    project_id: String,
    severity: String,
    role: String,
    summary: String,
    status: String,
    created_at: String,
    resolved_at: Option<String>,
}

impl TryFrom<EscalationRow> for Escalation {
    type Error = DomainError;

    fn try_from(row: EscalationRow) -> Result<Self, Self::Error> {
        let severity = EscalationSeverity::from_str(&row.severity).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid severity: {}", row.severity))
        })?;

        let status = EscalationStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid escalation status: {}", row.status))
        })?;

        Ok(Escalation {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            severity,
            role: row.role,
            summary: row.summary,
            status,
            created_at: parse_datetime(&row.created_at)?,
            resolved_at: parse_optional_datetime(row.resolved_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteProjectRepository};
    use crate::domain::models::{GateId, Project, ProjectCategory};
    use crate::domain::ports::ProjectRepository;

    async fn setup() -> (SqliteEscalationRepository, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let projects = SqliteProjectRepository::new(pool.clone());

        let project = Project::new(
            "checkout-service",
            ProjectCategory::Standard,
            "alice",
            GateId::G4,
            "Implementation",
        );
        projects.insert(&project).await.unwrap();

        (SqliteEscalationRepository::new(pool), project.id)
    }

    #[tokio::test]
    async fn test_insert_and_get_escalation() {
        let (repo, project_id) = setup().await;

        let escalation = Escalation::new(
            project_id,
            EscalationSeverity::High,
            "backend-developer",
            "3 build errors remain after repair budget",
        );
        repo.insert(&escalation).await.unwrap();

        let retrieved = repo.get(escalation.id).await.unwrap().unwrap();
        assert_eq!(retrieved.severity, EscalationSeverity::High);
        assert!(retrieved.is_pending());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let (repo, project_id) = setup().await;

        let open = Escalation::new(project_id, EscalationSeverity::High, "backend-developer", "open");
        let mut closed =
            Escalation::new(project_id, EscalationSeverity::Medium, "qa-engineer", "closed");
        closed.resolve();

        repo.insert(&open).await.unwrap();
        repo.insert(&closed).await.unwrap();

        let pending = repo
            .list_for_project(project_id, Some(EscalationStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].summary, "open");

        let all = repo.list_for_project(project_id, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_update_resolves_escalation() {
        let (repo, project_id) = setup().await;

        let mut escalation = Escalation::new(
            project_id,
            EscalationSeverity::Critical,
            "backend-developer",
            "unrecoverable",
        );
        repo.insert(&escalation).await.unwrap();

        escalation.resolve();
        repo.update(&escalation).await.unwrap();

        let retrieved = repo.get(escalation.id).await.unwrap().unwrap();
        assert_eq!(retrieved.status, EscalationStatus::Resolved);
        assert!(retrieved.resolved_at.is_some());
    }

    #[tokio::test]
    async fn test_update_missing_escalation_fails() {
        let (repo, project_id) = setup().await;
        let escalation =
            Escalation::new(project_id, EscalationSeverity::Low, "qa-engineer", "ghost");
        let err = repo.update(&escalation).await.unwrap_err();
        assert!(matches!(err, DomainError::EscalationNotFound(_)));
    }
}
