//! Deliverable and proof readiness tracking.
//!
//! A gate closes on two independent signals: every deliverable row for the
//! gate is complete (structural), and the proof artifacts the catalog
//! demands have a passing latest record (produced evidence). This service
//! owns both checks plus the mutators that feed them.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    latest_per_type, Deliverable, DeliverableStatus, GateCatalog, GateId, GateSpec, Project,
    ProjectCategory, ProofArtifact, ProofType,
};
use crate::domain::ports::{DeliverableRepository, ProofRepository};
use crate::services::event_bus::{EventBus, EventPayload};

/// Result of a proof requirement check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofCheck {
    pub ok: bool,
    /// Required proof types with no passing latest artifact.
    pub missing_types: Vec<String>,
}

impl ProofCheck {
    pub fn satisfied() -> Self {
        Self { ok: true, missing_types: Vec::new() }
    }

    fn missing(missing_types: Vec<String>) -> Self {
        Self { ok: missing_types.is_empty(), missing_types }
    }
}

/// Pure gate-wide proof check over a slice of artifacts.
///
/// Only the latest artifact per type counts, so an old failing attempt
/// never blocks a later passing retry. A proof-requiring gate with an
/// empty required list is satisfied by one passing artifact of any type.
pub fn evaluate_proofs(spec: &GateSpec, artifacts: &[ProofArtifact]) -> ProofCheck {
    if !spec.requires_proof {
        return ProofCheck::satisfied();
    }
    let latest = latest_per_type(artifacts);
    if spec.required_proofs.is_empty() {
        if latest.values().any(|artifact| artifact.passed) {
            return ProofCheck::satisfied();
        }
        return ProofCheck::missing(vec!["any".to_string()]);
    }
    let mut missing = Vec::new();
    for required in &spec.required_proofs {
        match latest.get(required) {
            Some(artifact) if artifact.passed => {}
            _ => missing.push(required.as_str().to_string()),
        }
    }
    ProofCheck::missing(missing)
}

/// Whether one role's own latest artifacts pass every per-role proof type
/// the gate demands. Vacuously true when the gate lists none.
pub fn role_proofs_satisfied(spec: &GateSpec, artifacts: &[ProofArtifact], role: &str) -> bool {
    if spec.role_proofs.is_empty() {
        return true;
    }
    let own: Vec<ProofArtifact> =
        artifacts.iter().filter(|a| a.role == role).cloned().collect();
    let latest = latest_per_type(&own);
    spec.role_proofs.iter().all(|required| {
        latest.get(required).map(|artifact| artifact.passed).unwrap_or(false)
    })
}

/// Tracks gate readiness and records the rows that drive it.
pub struct ProgressTracker {
    deliverables: Arc<dyn DeliverableRepository>,
    proofs: Arc<dyn ProofRepository>,
    catalog: Arc<GateCatalog>,
    events: Arc<EventBus>,
}

impl ProgressTracker {
    pub fn new(
        deliverables: Arc<dyn DeliverableRepository>,
        proofs: Arc<dyn ProofRepository>,
        catalog: Arc<GateCatalog>,
        events: Arc<EventBus>,
    ) -> Self {
        Self { deliverables, proofs, catalog, events }
    }

    /// True iff every deliverable row for the gate is complete. Vacuously
    /// true when the gate defines no deliverables.
    pub async fn deliverables_complete(
        &self,
        project_id: Uuid,
        gate_id: GateId,
    ) -> DomainResult<bool> {
        let rows = self.deliverables.list_for_gate(project_id, gate_id).await?;
        Ok(rows.iter().all(Deliverable::is_complete))
    }

    /// Names of the gate's deliverables that are not complete yet.
    pub async fn incomplete_deliverables(
        &self,
        project_id: Uuid,
        gate_id: GateId,
    ) -> DomainResult<Vec<String>> {
        let rows = self.deliverables.list_for_gate(project_id, gate_id).await?;
        Ok(rows.iter().filter(|d| !d.is_complete()).map(|d| d.name.clone()).collect())
    }

    /// Gate-wide proof check against a caller-supplied artifact slice.
    pub fn proof_requirements_satisfied(
        &self,
        category: ProjectCategory,
        gate_id: GateId,
        artifacts: &[ProofArtifact],
    ) -> DomainResult<ProofCheck> {
        let spec = self
            .catalog
            .spec(category, gate_id)
            .ok_or(DomainError::CatalogEntryMissing { category, gate: gate_id })?;
        Ok(evaluate_proofs(spec, artifacts))
    }

    /// Gate-wide proof check loading the gate's artifacts first.
    pub async fn proof_requirements_satisfied_for(
        &self,
        project: &Project,
        gate_id: GateId,
    ) -> DomainResult<ProofCheck> {
        let artifacts = self.proofs.list_for_gate(project.id, gate_id).await?;
        self.proof_requirements_satisfied(project.category, gate_id, &artifacts)
    }

    /// Mark every deliverable a role owes the gate complete. Returns the
    /// number of rows touched; zero is normal for roles without
    /// deliverables on this gate.
    pub async fn mark_deliverables_complete(
        &self,
        project_id: Uuid,
        gate_id: GateId,
        role: &str,
    ) -> DomainResult<u64> {
        let touched = self
            .deliverables
            .set_status_for_role(project_id, gate_id, role, DeliverableStatus::Complete)
            .await?;
        if touched > 0 {
            tracing::debug!(
                project_id = %project_id,
                gate = %gate_id,
                role = %role,
                touched,
                "deliverables marked complete"
            );
            self.events.emit(EventPayload::DeliverablesCompleted {
                project_id,
                gate_id,
                role: role.to_string(),
            });
        }
        Ok(touched)
    }

    /// Append one proof artifact and announce it.
    pub async fn record_proof(
        &self,
        project_id: Uuid,
        gate_id: GateId,
        proof_type: ProofType,
        passed: bool,
        summary: impl Into<String>,
        role: impl Into<String>,
    ) -> DomainResult<ProofArtifact> {
        let artifact =
            ProofArtifact::new(project_id, gate_id, proof_type, passed, summary, role);
        self.proofs.insert(&artifact).await?;
        tracing::info!(
            project_id = %project_id,
            gate = %gate_id,
            proof_type = %proof_type,
            passed,
            "proof artifact recorded"
        );
        self.events.emit(EventPayload::ProofRecorded {
            project_id,
            gate_id,
            proof_type,
            passed,
            role: artifact.role.clone(),
        });
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteDeliverableRepository, SqliteProjectRepository,
        SqliteProofRepository,
    };
    use crate::domain::models::{Deliverable, GateCatalog};
    use crate::domain::ports::ProjectRepository;

    fn spec_with_proofs(required: &[ProofType], per_role: &[ProofType]) -> GateSpec {
        let catalog = GateCatalog::builtin();
        let mut spec =
            catalog.spec(ProjectCategory::Standard, GateId::G4).unwrap().clone();
        spec.required_proofs = required.to_vec();
        spec.role_proofs = per_role.to_vec();
        spec
    }

    fn artifact(proof_type: ProofType, passed: bool, role: &str) -> ProofArtifact {
        ProofArtifact::new(Uuid::new_v4(), GateId::G4, proof_type, passed, "s", role)
    }

    async fn tracker() -> (ProgressTracker, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let projects = SqliteProjectRepository::new(pool.clone());
        let project =
            Project::new("shop", ProjectCategory::Standard, "owner", GateId::G1, "intake");
        projects.insert(&project).await.unwrap();
        let tracker = ProgressTracker::new(
            Arc::new(SqliteDeliverableRepository::new(pool.clone())),
            Arc::new(SqliteProofRepository::new(pool)),
            Arc::new(GateCatalog::builtin()),
            Arc::new(EventBus::default()),
        );
        (tracker, project.id)
    }

    #[test]
    fn latest_passing_artifact_satisfies_after_earlier_failure() {
        let spec = spec_with_proofs(&[ProofType::Build], &[]);
        let mut failing = artifact(ProofType::Build, false, "backend-developer");
        failing.created_at -= chrono::Duration::seconds(10);
        let passing = artifact(ProofType::Build, true, "backend-developer");

        let check = evaluate_proofs(&spec, &[failing, passing]);
        assert!(check.ok);
        assert!(check.missing_types.is_empty());
    }

    #[test]
    fn failing_latest_artifact_reports_the_type() {
        let spec = spec_with_proofs(&[ProofType::Build, ProofType::Lint], &[]);
        let check = evaluate_proofs(
            &spec,
            &[artifact(ProofType::Build, true, "backend-developer"),
              artifact(ProofType::Lint, false, "backend-developer")],
        );
        assert!(!check.ok);
        assert_eq!(check.missing_types, vec!["lint".to_string()]);
    }

    #[test]
    fn empty_required_list_accepts_any_passing_artifact() {
        let spec = spec_with_proofs(&[], &[]);
        let check = evaluate_proofs(&spec, &[artifact(ProofType::Test, true, "qa-engineer")]);
        assert!(check.ok);

        let check = evaluate_proofs(&spec, &[]);
        assert!(!check.ok);
        assert_eq!(check.missing_types, vec!["any".to_string()]);
    }

    #[test]
    fn gate_without_proof_requirement_is_always_satisfied() {
        let catalog = GateCatalog::builtin();
        let spec = catalog.spec(ProjectCategory::Standard, GateId::G1).unwrap();
        let check = evaluate_proofs(spec, &[]);
        assert!(check.ok);
    }

    #[test]
    fn role_proofs_only_count_the_roles_own_artifacts() {
        let spec = spec_with_proofs(&[ProofType::Build], &[ProofType::Build, ProofType::Lint]);
        let artifacts = vec![
            artifact(ProofType::Build, true, "backend-developer"),
            artifact(ProofType::Lint, true, "backend-developer"),
            artifact(ProofType::Build, true, "frontend-developer"),
        ];
        assert!(role_proofs_satisfied(&spec, &artifacts, "backend-developer"));
        // Frontend never produced a lint proof of its own.
        assert!(!role_proofs_satisfied(&spec, &artifacts, "frontend-developer"));
    }

    #[tokio::test]
    async fn deliverables_complete_is_gate_scoped_and_vacuous_on_empty() {
        let (tracker, project_id) = tracker().await;
        assert!(tracker.deliverables_complete(project_id, GateId::G4).await.unwrap());

        let rows = vec![
            Deliverable::new(project_id, GateId::G4, "backend-source", "backend-developer"),
            Deliverable::new(project_id, GateId::G5, "test-report", "qa-engineer"),
        ];
        tracker.deliverables.insert_many(&rows).await.unwrap();

        assert!(!tracker.deliverables_complete(project_id, GateId::G4).await.unwrap());
        tracker
            .mark_deliverables_complete(project_id, GateId::G4, "backend-developer")
            .await
            .unwrap();
        // G4 closes while G5's pending row stays untouched.
        assert!(tracker.deliverables_complete(project_id, GateId::G4).await.unwrap());
        assert!(!tracker.deliverables_complete(project_id, GateId::G5).await.unwrap());
    }

    #[tokio::test]
    async fn incomplete_deliverables_lists_pending_names() {
        let (tracker, project_id) = tracker().await;
        let rows = vec![
            Deliverable::new(project_id, GateId::G4, "backend-source", "backend-developer"),
            Deliverable::new(project_id, GateId::G4, "frontend-source", "frontend-developer"),
        ];
        tracker.deliverables.insert_many(&rows).await.unwrap();
        tracker
            .mark_deliverables_complete(project_id, GateId::G4, "backend-developer")
            .await
            .unwrap();

        let pending = tracker.incomplete_deliverables(project_id, GateId::G4).await.unwrap();
        assert_eq!(pending, vec!["frontend-source".to_string()]);
    }

    #[tokio::test]
    async fn record_proof_persists_and_publishes() {
        let (tracker, project_id) = tracker().await;
        let mut rx = tracker.events.subscribe();

        tracker
            .record_proof(project_id, GateId::G4, ProofType::Build, true, "clean", "backend-developer")
            .await
            .unwrap();

        let stored = tracker.proofs.list_for_gate(project_id, GateId::G4).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].passed);

        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event.payload,
            EventPayload::ProofRecorded { proof_type: ProofType::Build, passed: true, .. }
        ));
    }

    #[tokio::test]
    async fn proof_requirements_satisfied_loads_from_the_repository() {
        let (tracker, project_id) = tracker().await;
        let mut project = Project::new(
            "shop",
            ProjectCategory::Standard,
            "owner",
            GateId::G1,
            "intake",
        );
        project.id = project_id;

        let check =
            tracker.proof_requirements_satisfied_for(&project, GateId::G4).await.unwrap();
        assert!(!check.ok);
        assert_eq!(check.missing_types.len(), 3);

        for proof_type in [ProofType::Build, ProofType::Lint, ProofType::Runtime] {
            tracker
                .record_proof(project.id, GateId::G4, proof_type, true, "ok", "backend-developer")
                .await
                .unwrap();
        }
        let check =
            tracker.proof_requirements_satisfied_for(&project, GateId::G4).await.unwrap();
        assert!(check.ok);
    }
}
