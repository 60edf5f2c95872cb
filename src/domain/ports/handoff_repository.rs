//! Port for handoff persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Handoff;

#[async_trait]
pub trait HandoffRepository: Send + Sync {
    async fn insert(&self, handoff: &Handoff) -> DomainResult<()>;

    async fn list_for_project(&self, project_id: Uuid) -> DomainResult<Vec<Handoff>>;

    /// Most recent handoff addressed to a role; the context an agent picks
    /// up before starting its slot.
    async fn latest_for_role(&self, project_id: Uuid, to_role: &str)
        -> DomainResult<Option<Handoff>>;
}
