//! Port for deliverable persistence. Every query is gate-scoped.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Deliverable, DeliverableStatus, GateId};

#[async_trait]
pub trait DeliverableRepository: Send + Sync {
    async fn insert_many(&self, deliverables: &[Deliverable]) -> DomainResult<()>;

    async fn list_for_gate(&self, project_id: Uuid, gate_id: GateId)
        -> DomainResult<Vec<Deliverable>>;

    async fn list_for_project(&self, project_id: Uuid) -> DomainResult<Vec<Deliverable>>;

    /// Set the status of every deliverable one role owes a gate. Returns
    /// the number of rows touched.
    async fn set_status_for_role(
        &self,
        project_id: Uuid,
        gate_id: GateId,
        role: &str,
        status: DeliverableStatus,
    ) -> DomainResult<u64>;
}
