//! Port for agent execution attempt persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentAttempt, GateId};

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    async fn insert(&self, attempt: &AgentAttempt) -> DomainResult<()>;

    async fn update(&self, attempt: &AgentAttempt) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<AgentAttempt>>;

    /// Attempts for a gate, oldest first.
    async fn list_for_gate(&self, project_id: Uuid, gate_id: GateId)
        -> DomainResult<Vec<AgentAttempt>>;

    /// FAILED attempts for a role within a gate, optionally bounded to a
    /// recent window. Feeds the retry budget.
    async fn count_failed(
        &self,
        project_id: Uuid,
        gate_id: GateId,
        role: &str,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<u64>;

    /// Whether any attempt for the gate is still RUNNING.
    async fn any_running(&self, project_id: Uuid, gate_id: GateId) -> DomainResult<bool>;
}
