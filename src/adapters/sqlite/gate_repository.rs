//! SQLite implementation of the GateRepository.
//!
//! `commit_approval` is the one write path that spans tables: the approved
//! gate, the successor gate with its deliverable set, and the project
//! pointer all land in a single transaction.

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Deliverable, Gate, GateId, GateStatus, Project};
use crate::domain::ports::{GateApproval, GateRepository};

use super::{parse_datetime, parse_optional_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteGateRepository {
    pool: SqlitePool,
}

impl SqliteGateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_gate_tx(tx: &mut Transaction<'_, Sqlite>, gate: &Gate) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO gates (id, project_id, gate_id, status, requires_proof, passing_criteria, approved_by, approved_at, rejection_reason, notes, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(gate.id.to_string())
        .bind(gate.project_id.to_string())
        .bind(gate.gate_id.as_str())
        .bind(gate.status.as_str())
        .bind(gate.requires_proof)
        .bind(&gate.passing_criteria)
        .bind(gate.approved_by.as_deref())
        .bind(gate.approved_at.map(|dt| dt.to_rfc3339()))
        .bind(gate.rejection_reason.as_deref())
        .bind(gate.notes.as_deref())
        .bind(gate.created_at.to_rfc3339())
        .bind(gate.updated_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn insert_deliverable_tx(
        tx: &mut Transaction<'_, Sqlite>,
        deliverable: &Deliverable,
    ) -> DomainResult<()> {
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
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn update_gate_tx(tx: &mut Transaction<'_, Sqlite>, gate: &Gate) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE gates SET status = ?, requires_proof = ?, passing_criteria = ?,
               approved_by = ?, approved_at = ?, rejection_reason = ?, notes = ?, updated_at = ?
               WHERE project_id = ? AND gate_id = ?"#,
        )
        .bind(gate.status.as_str())
        .bind(gate.requires_proof)
        .bind(&gate.passing_criteria)
        .bind(gate.approved_by.as_deref())
        .bind(gate.approved_at.map(|dt| dt.to_rfc3339()))
        .bind(gate.rejection_reason.as_deref())
        .bind(gate.notes.as_deref())
        .bind(gate.updated_at.to_rfc3339())
        .bind(gate.project_id.to_string())
        .bind(gate.gate_id.as_str())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::GateNotFound {
                project: gate.project_id,
                gate: gate.gate_id,
            });
        }

        Ok(())
    }

    async fn update_project_tx(
        tx: &mut Transaction<'_, Sqlite>,
        project: &Project,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE projects SET current_gate = ?, current_phase = ?, updated_at = ?, completed_at = ?
               WHERE id = ?"#,
        )
        .bind(project.current_gate.as_str())
        .bind(&project.current_phase)
        .bind(project.updated_at.to_rfc3339())
        .bind(project.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(project.id.to_string())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ProjectNotFound(project.id));
        }

        Ok(())
    }
}

#[async_trait]
impl GateRepository for SqliteGateRepository {
    async fn insert(&self, gate: &Gate) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO gates (id, project_id, gate_id, status, requires_proof, passing_criteria, approved_by, approved_at, rejection_reason, notes, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(gate.id.to_string())
        .bind(gate.project_id.to_string())
        .bind(gate.gate_id.as_str())
        .bind(gate.status.as_str())
        .bind(gate.requires_proof)
        .bind(&gate.passing_criteria)
        .bind(gate.approved_by.as_deref())
        .bind(gate.approved_at.map(|dt| dt.to_rfc3339()))
        .bind(gate.rejection_reason.as_deref())
        .bind(gate.notes.as_deref())
        .bind(gate.created_at.to_rfc3339())
        .bind(gate.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, project_id: Uuid, gate_id: GateId) -> DomainResult<Option<Gate>> {
        let row: Option<GateRow> = sqlx::query_as(
            "SELECT id, project_id, gate_id, status, requires_proof, passing_criteria, approved_by, approved_at, rejection_reason, notes, created_at, updated_at FROM gates WHERE project_id = ? AND gate_id = ?",
        )
        .bind(project_id.to_string())
        .bind(gate_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn update(&self, gate: &Gate) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE gates SET status = ?, requires_proof = ?, passing_criteria = ?,
               approved_by = ?, approved_at = ?, rejection_reason = ?, notes = ?, updated_at = ?
               WHERE project_id = ? AND gate_id = ?"#,
        )
        .bind(gate.status.as_str())
        .bind(gate.requires_proof)
        .bind(&gate.passing_criteria)
        .bind(gate.approved_by.as_deref())
        .bind(gate.approved_at.map(|dt| dt.to_rfc3339()))
        .bind(gate.rejection_reason.as_deref())
        .bind(gate.notes.as_deref())
        .bind(gate.updated_at.to_rfc3339())
        .bind(gate.project_id.to_string())
        .bind(gate.gate_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::GateNotFound {
                project: gate.project_id,
                gate: gate.gate_id,
            });
        }

        Ok(())
    }

    async fn list_for_project(&self, project_id: Uuid) -> DomainResult<Vec<Gate>> {
        let rows: Vec<GateRow> = sqlx::query_as(
            "SELECT id, project_id, gate_id, status, requires_proof, passing_criteria, approved_by, approved_at, rejection_reason, notes, created_at, updated_at FROM gates WHERE project_id = ? ORDER BY created_at",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn commit_approval(&self, approval: &GateApproval) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        Self::update_gate_tx(&mut tx, &approval.gate).await?;

        if let Some(next_gate) = &approval.next_gate {
            Self::insert_gate_tx(&mut tx, next_gate).await?;
            for deliverable in &approval.next_deliverables {
                Self::insert_deliverable_tx(&mut tx, deliverable).await?;
            }
        }

        Self::update_project_tx(&mut tx, &approval.project).await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct GateRow {
    id: String,
    project_id: String,
    gate_id: String,
    status: String,
    requires_proof: bool,
    passing_criteria: String,
    approved_by: Option<String>,
    approved_at: Option<String>,
    rejection_reason: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<GateRow> for Gate {
    type Error = DomainError;

    fn try_from(row: GateRow) -> Result<Self, Self::Error> {
        let gate_id = GateId::from_str(&row.gate_id).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid gate id: {}", row.gate_id))
        })?;

        let status = GateStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid gate status: {}", row.status))
        })?;

        Ok(Gate {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            gate_id,
            status,
            requires_proof: row.requires_proof,
            passing_criteria: row.passing_criteria,
            approved_by: row.approved_by,
            approved_at: parse_optional_datetime(row.approved_at)?,
            rejection_reason: row.rejection_reason,
            notes: row.notes,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteProjectRepository};
    use crate::domain::models::{DeliverableStatus, ProjectCategory};
    use crate::domain::ports::ProjectRepository;

    async fn setup() -> (SqliteGateRepository, SqliteProjectRepository, Project) {
        let pool = create_migrated_test_pool().await.unwrap();
        let gates = SqliteGateRepository::new(pool.clone());
        let projects = SqliteProjectRepository::new(pool);

        let project = Project::new(
            "checkout-service",
            ProjectCategory::Standard,
            "alice",
            GateId::G1,
            "Requirements",
        );
        projects.insert(&project).await.unwrap();

        (gates, projects, project)
    }

    #[tokio::test]
    async fn test_insert_and_get_gate() {
        let (gates, _, project) = setup().await;

        let gate = Gate::new(project.id, GateId::G1).with_passing_criteria("requirements signed off");
        gates.insert(&gate).await.unwrap();

        let retrieved = gates.get(project.id, GateId::G1).await.unwrap().unwrap();
        assert_eq!(retrieved.status, GateStatus::Pending);
        assert_eq!(retrieved.passing_criteria, "requirements signed off");
        assert!(!retrieved.requires_proof);
    }

    #[tokio::test]
    async fn test_duplicate_gate_rejected_by_unique_index() {
        let (gates, _, project) = setup().await;

        let gate = Gate::new(project.id, GateId::G1);
        gates.insert(&gate).await.unwrap();

        let duplicate = Gate::new(project.id, GateId::G1);
        assert!(gates.insert(&duplicate).await.is_err());
    }

    #[tokio::test]
    async fn test_update_missing_gate_fails() {
        let (gates, _, project) = setup().await;

        let gate = Gate::new(project.id, GateId::G3);
        let err = gates.update(&gate).await.unwrap_err();
        assert!(matches!(err, DomainError::GateNotFound { .. }));
    }

    #[tokio::test]
    async fn test_commit_approval_applies_all_three_writes() {
        let (gates, projects, mut project) = setup().await;

        let mut gate = Gate::new(project.id, GateId::G1);
        gates.insert(&gate).await.unwrap();
        gate.transition_to(GateStatus::InReview).unwrap();
        gates.update(&gate).await.unwrap();

        gate.approve("alice", None).unwrap();
        let next_gate = Gate::new(project.id, GateId::G2);
        let next_deliverables = vec![Deliverable::new(
            project.id,
            GateId::G2,
            "formal-spec",
            "spec-writer",
        )];
        project.advance_to(GateId::G2, "Specification");

        gates
            .commit_approval(&GateApproval {
                gate: gate.clone(),
                next_gate: Some(next_gate),
                next_deliverables,
                project: project.clone(),
            })
            .await
            .unwrap();

        let approved = gates.get(project.id, GateId::G1).await.unwrap().unwrap();
        assert_eq!(approved.status, GateStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("alice"));

        let successor = gates.get(project.id, GateId::G2).await.unwrap().unwrap();
        assert_eq!(successor.status, GateStatus::Pending);

        let advanced = projects.get(project.id).await.unwrap().unwrap();
        assert_eq!(advanced.current_gate, GateId::G2);
    }

    #[tokio::test]
    async fn test_commit_approval_rolls_back_on_duplicate_successor() {
        let (gates, projects, mut project) = setup().await;

        let mut gate = Gate::new(project.id, GateId::G1);
        gates.insert(&gate).await.unwrap();
        gate.transition_to(GateStatus::InReview).unwrap();
        gates.update(&gate).await.unwrap();

        // Successor already exists, so the transaction must fail and leave
        // the original gate and the project pointer untouched.
        let existing = Gate::new(project.id, GateId::G2);
        gates.insert(&existing).await.unwrap();

        gate.approve("alice", None).unwrap();
        project.advance_to(GateId::G2, "Specification");

        let result = gates
            .commit_approval(&GateApproval {
                gate: gate.clone(),
                next_gate: Some(Gate::new(project.id, GateId::G2)),
                next_deliverables: vec![],
                project: project.clone(),
            })
            .await;
        assert!(result.is_err());

        let unchanged = gates.get(project.id, GateId::G1).await.unwrap().unwrap();
        assert_eq!(unchanged.status, GateStatus::InReview);

        let pointer = projects.get(project.id).await.unwrap().unwrap();
        assert_eq!(pointer.current_gate, GateId::G1);
    }

    #[tokio::test]
    async fn test_commit_approval_without_successor_completes_project() {
        let (gates, projects, mut project) = setup().await;

        let mut gate = Gate::new(project.id, GateId::G9);
        gates.insert(&gate).await.unwrap();
        gate.transition_to(GateStatus::InReview).unwrap();
        gates.update(&gate).await.unwrap();

        gate.approve("alice", Some("ship it".to_string())).unwrap();
        project.mark_complete();

        gates
            .commit_approval(&GateApproval {
                gate: gate.clone(),
                next_gate: None,
                next_deliverables: vec![],
                project: project.clone(),
            })
            .await
            .unwrap();

        let finished = projects.get(project.id).await.unwrap().unwrap();
        assert!(finished.is_complete());
        assert_eq!(finished.current_gate, GateId::Complete);
    }

    #[tokio::test]
    async fn test_commit_approval_creates_successor_deliverables() {
        let (gates, _, mut project) = setup().await;

        let mut gate = Gate::new(project.id, GateId::G1);
        gates.insert(&gate).await.unwrap();
        gate.transition_to(GateStatus::InReview).unwrap();
        gates.update(&gate).await.unwrap();

        gate.approve("alice", None).unwrap();
        project.advance_to(GateId::G2, "Specification");

        gates
            .commit_approval(&GateApproval {
                gate,
                next_gate: Some(Gate::new(project.id, GateId::G2)),
                next_deliverables: vec![
                    Deliverable::new(project.id, GateId::G2, "formal-spec", "spec-writer"),
                    Deliverable::new(project.id, GateId::G2, "api-contract", "spec-writer"),
                ],
                project: project.clone(),
            })
            .await
            .unwrap();

        let pool = &gates.pool;
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM deliverables WHERE project_id = ? AND gate_id = 'G2'",
        )
        .bind(project.id.to_string())
        .fetch_one(pool)
        .await
        .unwrap();
        assert_eq!(count, 2);

        let statuses: Vec<(String,)> = sqlx::query_as(
            "SELECT status FROM deliverables WHERE project_id = ? AND gate_id = 'G2'",
        )
        .bind(project.id.to_string())
        .fetch_all(pool)
        .await
        .unwrap();
        assert!(statuses
            .iter()
            .all(|(s,)| s == DeliverableStatus::NotStarted.as_str()));
    }
}
