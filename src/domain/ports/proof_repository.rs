//! Port for proof artifact persistence. Append-only.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{GateId, ProofArtifact};

#[async_trait]
pub trait ProofRepository: Send + Sync {
    async fn insert(&self, artifact: &ProofArtifact) -> DomainResult<()>;

    /// Artifacts for a gate in creation order, oldest first, so callers can
    /// fold down to the latest record per type.
    async fn list_for_gate(&self, project_id: Uuid, gate_id: GateId)
        -> DomainResult<Vec<ProofArtifact>>;
}
