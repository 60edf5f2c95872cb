//! SQLite implementation of the AttemptRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentAttempt, AttemptStatus, GateId};
use crate::domain::ports::AttemptRepository;

use super::{parse_datetime, parse_json_or_default, parse_optional_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptRepository for SqliteAttemptRepository {
    async fn insert(&self, attempt: &AgentAttempt) -> DomainResult<()> {
        let warnings_json = serde_json::to_string(&attempt.warnings)?;

        sqlx::query(
            r#"INSERT INTO agent_attempts (id, project_id, gate_id, role, status, input_summary, output, error, input_tokens, output_tokens, warnings, started_at, ended_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(attempt.id.to_string())
        .bind(attempt.project_id.to_string())
        .bind(attempt.gate_id.as_str())
        .bind(attempt.role.as_str())
        .bind(attempt.status.as_str())
        .bind(&attempt.input_summary)
        .bind(attempt.output.as_deref())
        .bind(attempt.error.as_deref())
        .bind(attempt.input_tokens as i64)
        .bind(attempt.output_tokens as i64)
        .bind(&warnings_json)
        .bind(attempt.started_at.to_rfc3339())
        .bind(attempt.ended_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, attempt: &AgentAttempt) -> DomainResult<()> {
        let warnings_json = serde_json::to_string(&attempt.warnings)?;

        let result = sqlx::query(
            r#"UPDATE agent_attempts SET status = ?, output = ?, error = ?,
               input_tokens = ?, output_tokens = ?, warnings = ?, ended_at = ?
               WHERE id = ?"#,
        )
        .bind(attempt.status.as_str())
        .bind(attempt.output.as_deref())
        .bind(attempt.error.as_deref())
        .bind(attempt.input_tokens as i64)
        .bind(attempt.output_tokens as i64)
        .bind(&warnings_json)
        .bind(attempt.ended_at.map(|dt| dt.to_rfc3339()))
        .bind(attempt.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AttemptNotFound(attempt.id));
        }

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<AgentAttempt>> {
        let row: Option<AttemptRow> = sqlx::query_as(
            "SELECT id, project_id, gate_id, role, status, input_summary, output, error, input_tokens, output_tokens, warnings, started_at, ended_at FROM agent_attempts WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn list_for_gate(
        &self,
        project_id: Uuid,
        gate_id: GateId,
    ) -> DomainResult<Vec<AgentAttempt>> {
        let rows: Vec<AttemptRow> = sqlx::query_as(
            "SELECT id, project_id, gate_id, role, status, input_summary, output, error, input_tokens, output_tokens, warnings, started_at, ended_at FROM agent_attempts WHERE project_id = ? AND gate_id = ? ORDER BY started_at",
        )
        .bind(project_id.to_string())
        .bind(gate_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn count_failed(
        &self,
        project_id: Uuid,
        gate_id: GateId,
        role: &str,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<u64> {
        let count: (i64,) = match since {
            Some(cutoff) => {
                sqlx::query_as(
                    "SELECT COUNT(*) FROM agent_attempts WHERE project_id = ? AND gate_id = ? AND role = ? AND status = 'failed' AND started_at >= ?",
                )
                .bind(project_id.to_string())
                .bind(gate_id.as_str())
                .bind(role)
                .bind(cutoff.to_rfc3339())
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT COUNT(*) FROM agent_attempts WHERE project_id = ? AND gate_id = ? AND role = ? AND status = 'failed'",
                )
                .bind(project_id.to_string())
                .bind(gate_id.as_str())
                .bind(role)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(count.0 as u64)
    }

    async fn any_running(&self, project_id: Uuid, gate_id: GateId) -> DomainResult<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM agent_attempts WHERE project_id = ? AND gate_id = ? AND status = 'running'",
        )
        .bind(project_id.to_string())
        .bind(gate_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 > 0)
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: String,
    project_id: String,
    gate_id: String,
    role: String,
    status: String,
    input_summary: String,
    output: Option<String>,
    error: Option<String>,
    input_tokens: i64,
    output_tokens: i64,
    warnings: Option<String>,
    started_at: String,
    ended_at: Option<String>,
}

impl TryFrom<AttemptRow> for AgentAttempt {
    type Error = DomainError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let gate_id = GateId::from_str(&row.gate_id).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid gate id: {}", row.gate_id))
        })?;

        let status = AttemptStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid attempt status: {}", row.status))
        })?;

        Ok(AgentAttempt {
            id: parse_uuid(&row.id)?,
            project_id: parse_uuid(&row.project_id)?,
            gate_id,
            role: row.role,
            status,
            input_summary: row.input_summary,
            output: row.output,
            error: row.error,
            input_tokens: row.input_tokens.max(0) as u64,
            output_tokens: row.output_tokens.max(0) as u64,
            warnings: parse_json_or_default(row.warnings)?,
            started_at: parse_datetime(&row.started_at)?,
            ended_at: parse_optional_datetime(row.ended_at)?,
        })
    }
}
