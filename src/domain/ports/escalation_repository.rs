//! Port for escalation persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Escalation, EscalationStatus};

#[async_trait]
pub trait EscalationRepository: Send + Sync {
    async fn insert(&self, escalation: &Escalation) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Escalation>>;

    async fn list_for_project(
        &self,
        project_id: Uuid,
        status: Option<EscalationStatus>,
    ) -> DomainResult<Vec<Escalation>>;

    async fn update(&self, escalation: &Escalation) -> DomainResult<()>;
}
