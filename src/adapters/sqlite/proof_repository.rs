//! SQLite implementation of the ProofRepository. Append-only; readers fold
//! the creation-ordered list down to the latest artifact per proof type.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{GateId, ProofArtifact, ProofType};
use crate::domain::ports::ProofRepository;

use super::{parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteProofRepository {
    pool: SqlitePool,
}

impl SqliteProofRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProofRepository for SqliteProofRepository {
    async fn insert(&self, artifact: &ProofArtifact) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO proof_artifacts (id, project_id, gate_id, proof_type, passed, summary, role, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(artifact.id.to_string())
        .bind(artifact.project_id.to_string())
        .bind(artifact.gate_id.as_str())
        .bind(artifact.proof_type.as_str())
        .bind(artifact.passed)
        .bind(&artifact.summary)
        .bind(&artifact.role)
        .bind(artifact.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_gate(
        &self,
        project_id: Uuid,
        gate_id: GateId,
    ) -> DomainResult<Vec<ProofArtifact>> {
        let rows: Vec<ProofRow> = sqlx::query_as(
            "SELECT id, project_id, gate_id, proof_type, passed, summary, role, created_at FROM proof_artifacts WHERE project_id = ? AND gate_id = ? ORDER BY created_at",
        )
        .bind(project_id.to_string())
        .bind(gate_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ProofRow {
    id: String,
    project_id: String,
    gate_id: String,
    proof_type: String,
    passed: bool,
    summary: String,
    role: String,
    created_at: String,
}

impl TryFrom<ProofRow> for ProofArtifact {
    type Error = DomainError;

    fn try_from(row: ProofRow) -> Result<Self, Self::Error> {
        let gate_id = GateId::from_str(&row.gate_id).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid gate id: {}", row.gate_id))
        })?;

        let proof_type = ProofType::from_str(&row.proof_type).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid proof type: {}", row.proof_type))
        })?;

        Ok(ProofArtifact {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            gate_id,
            proof_type,
            passed: row.passed,
            summary: row.summary,
            role: row.role,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
