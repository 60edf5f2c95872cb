//! SQLite implementation of the DeliverableRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Deliverable, DeliverableStatus, GateId};
use crate::domain::ports::DeliverableRepository;

use super::{parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteDeliverableRepository {
    pool: SqlitePool,
}

impl SqliteDeliverableRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliverableRepository for SqliteDeliverableRepository {
    async fn insert_many(&self, deliverables: &[Deliverable]) -> DomainResult<()> {
        if deliverables.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for deliverable in deliverables {
            sqlx::query(
                r#"INSERT INTO deliverables (id, project_id, gate_id, name, role, status, created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(deliverable.id.to_string())
            .bind(deliverable.project_id.to_string())
            .bind(deliverable.gate_id.as_str())
            .bind(&deliverable.name)
            .bind(&deliverable.role)
            .bind(deliverable.status.as_str())
            .bind(deliverable.created_at.to_rfc3339())
            .bind(deliverable.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn list_for_gate(
        &self,
        project_id: Uuid,
        gate_id: GateId,
    ) -> DomainResult<Vec<Deliverable>> {
        let rows: Vec<DeliverableRow> = sqlx::query_as(
            "SELECT id, project_id, gate_id, name, role, status, created_at, updated_at FROM deliverables WHERE project_id = ? AND gate_id = ? ORDER BY created_at",
        )
        .bind(project_id.to_string())
        .bind(gate_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn list_for_project(&self, project_id: Uuid) -> DomainResult<Vec<Deliverable>> {
        let rows: Vec<DeliverableRow> = sqlx::query_as(
            "SELECT id, project_id, gate_id, name, role, status, created_at, updated_at FROM deliverables WHERE project_id = ? ORDER BY created_at",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn set_status_for_role(
        &self,
        project_id: Uuid,
        gate_id: GateId,
        role: &str,
        status: DeliverableStatus,
    ) -> DomainResult<u64> {
        let result = sqlx::query(
            "UPDATE deliverables SET status = ?, updated_at = ? WHERE project_id = ? AND gate_id = ? AND role = ?",
        )
        .bind(status.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(project_id.to_string())
        .bind(gate_id.as_str())
        .bind(role)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct DeliverableRow {
    id: String,
    project_id: String,
    gate_id: String,
    name: String,
    role: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<DeliverableRow> for Deliverable {
    type Error = DomainError;

    fn try_from(row: DeliverableRow) -> Result<Self, Self::Error> {
        let gate_id = GateId::from_str(&row.gate_id).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid gate id: {}", row.gate_id))
        })?;

        let status = DeliverableStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid deliverable status: {}", row.status))
        })?;

        Ok(Deliverable {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            gate_id,
            name: row.name,
            role: row.role,
            status,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteProjectRepository};
    use crate::domain::models::{Project, ProjectCategory};
    use crate::domain::ports::ProjectRepository;

    async fn setup() -> (SqliteDeliverableRepository, Uuid) {
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

        (SqliteDeliverableRepository::new(pool), project.id)
    }

    #[tokio::test]
    async fn test_insert_many_and_list_for_gate() {
        let (repo, project_id) = setup().await;

        let deliverables = vec![
            Deliverable::new(project_id, GateId::G4, "api-endpoints", "backend-developer"),
            Deliverable::new(project_id, GateId::G4, "ui-components", "frontend-developer"),
            Deliverable::new(project_id, GateId::G5, "test-report", "qa-engineer"),
        ];
        repo.insert_many(&deliverables).await.unwrap();

        let g4 = repo.list_for_gate(project_id, GateId::G4).await.unwrap();
        assert_eq!(g4.len(), 2);
        assert!(g4.iter().all(|d| d.status == DeliverableStatus::NotStarted));

        let all = repo.list_for_project(project_id).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_insert_many_empty_is_a_no_op() {
        let (repo, project_id) = setup().await;
        repo.insert_many(&[]).await.unwrap();
        assert!(repo.list_for_project(project_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_status_for_role_touches_only_that_role() {
        let (repo, project_id) = setup().await;

        let deliverables = vec![
            Deliverable::new(project_id, GateId::G4, "api-endpoints", "backend-developer"),
            Deliverable::new(project_id, GateId::G4, "data-model", "backend-developer"),
            Deliverable::new(project_id, GateId::G4, "ui-components", "frontend-developer"),
        ];
        repo.insert_many(&deliverables).await.unwrap();

        let touched = repo
            .set_status_for_role(project_id, GateId::G4, "backend-developer", DeliverableStatus::Complete)
            .await
            .unwrap();
        assert_eq!(touched, 2);

        let listed = repo.list_for_gate(project_id, GateId::G4).await.unwrap();
        let complete: Vec<_> = listed.iter().filter(|d| d.is_complete()).collect();
        assert_eq!(complete.len(), 2);
        assert!(complete.iter().all(|d| d.role == "backend-developer"));
    }

    #[tokio::test]
    async fn test_set_status_for_unknown_role_touches_nothing() {
        let (repo, project_id) = setup().await;

        repo.insert_many(&[Deliverable::new(
            project_id,
            GateId::G4,
            "api-endpoints",
            "backend-developer",
        )])
        .await
        .unwrap();

        let touched = repo
            .set_status_for_role(project_id, GateId::G4, "ml-engineer", DeliverableStatus::Complete)
            .await
            .unwrap();
        assert_eq!(touched, 0);
    }
}
