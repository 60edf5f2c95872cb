//! Port for gate persistence, including the atomic approval unit.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Deliverable, Gate, GateId, Project};

/// Everything an approval writes, committed as one unit.
///
/// Approval flips the gate, creates the successor (with its deliverable
/// set) and advances the project pointer. A crash between those writes
/// would strand the project on an approved gate with nothing to drive
/// forward, so implementations must apply all of it or none of it.
#[derive(Debug, Clone)]
pub struct GateApproval {
    /// The gate with APPROVED already set on the value.
    pub gate: Gate,
    /// Successor gate to create, `None` when the approved gate was last.
    pub next_gate: Option<Gate>,
    /// Deliverable set for the successor gate.
    pub next_deliverables: Vec<Deliverable>,
    /// Project with the advanced pointer (or completion marker) set.
    pub project: Project,
}

#[async_trait]
pub trait GateRepository: Send + Sync {
    async fn insert(&self, gate: &Gate) -> DomainResult<()>;

    async fn get(&self, project_id: Uuid, gate_id: GateId) -> DomainResult<Option<Gate>>;

    async fn update(&self, gate: &Gate) -> DomainResult<()>;

    /// Gates for a project in creation order.
    async fn list_for_project(&self, project_id: Uuid) -> DomainResult<Vec<Gate>>;

    /// Apply an approval as a single all-or-nothing unit.
    async fn commit_approval(&self, approval: &GateApproval) -> DomainResult<()>;
}
