//! Gate lifecycle service.
//!
//! Owns a single gate instance from lazy creation through approval or
//! rejection. Approval is the only multi-write step in the system: the gate
//! flips to APPROVED, the successor gate and its deliverable set are
//! created, and the project pointer advances, all through one transactional
//! port operation. [`GateStateMachine::recover`] repairs the stranded state
//! a crash inside that step would otherwise leave behind.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DenialReason, DomainError, DomainResult};
use crate::domain::models::{
    ApprovalToken, Deliverable, Gate, GateCatalog, GateId, GateStatus, Project,
};
use crate::domain::ports::{
    DeliverableRepository, GateApproval, GateRepository, ProjectRepository,
};
use crate::services::event_bus::{EventBus, EventPayload};
use crate::services::progress_tracker::ProgressTracker;

/// What a recovery pass found and repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// First gate in catalog order that is not APPROVED, or the terminal
    /// marker when every gate is.
    pub frontier: GateId,
    /// Whether the frontier gate record had to be created.
    pub created_gate: bool,
    /// Whether the project pointer had to be moved onto the frontier.
    pub moved_pointer: bool,
}

impl RecoveryReport {
    /// True when the pass changed anything.
    pub fn repaired(&self) -> bool {
        self.created_gate || self.moved_pointer
    }
}

/// Drives gate status transitions and enforces approval preconditions.
pub struct GateStateMachine {
    projects: Arc<dyn ProjectRepository>,
    gates: Arc<dyn GateRepository>,
    deliverables: Arc<dyn DeliverableRepository>,
    tracker: Arc<ProgressTracker>,
    catalog: Arc<GateCatalog>,
    events: Arc<EventBus>,
}

impl GateStateMachine {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        gates: Arc<dyn GateRepository>,
        deliverables: Arc<dyn DeliverableRepository>,
        tracker: Arc<ProgressTracker>,
        catalog: Arc<GateCatalog>,
        events: Arc<EventBus>,
    ) -> Self {
        Self { projects, gates, deliverables, tracker, catalog, events }
    }

    /// Build a gate and its deliverable set from the catalog row.
    fn gate_from_catalog(
        &self,
        project: &Project,
        gate_id: GateId,
    ) -> DomainResult<(Gate, Vec<Deliverable>)> {
        let spec = self.catalog.spec(project.category, gate_id).ok_or(
            DomainError::CatalogEntryMissing { category: project.category, gate: gate_id },
        )?;
        let gate = Gate::new(project.id, gate_id)
            .with_requires_proof(spec.requires_proof)
            .with_passing_criteria(spec.passing_criteria.as_str());
        let deliverables = spec
            .deliverables
            .iter()
            .map(|d| Deliverable::new(project.id, gate_id, d.name.clone(), d.role.clone()))
            .collect();
        Ok((gate, deliverables))
    }

    /// Create the project's first gate PENDING with its catalog
    /// deliverables. A second call finds the existing record and is a no-op.
    pub async fn initialize_gates(&self, project: &Project) -> DomainResult<Gate> {
        let first = self.catalog.first_gate(project.category).ok_or(
            DomainError::CatalogEntryMissing {
                category: project.category,
                gate: project.current_gate,
            },
        )?;
        self.ensure_exists(project, first).await
    }

    /// Idempotent create-if-missing for one gate and its deliverable set.
    /// Also the recovery primitive after a partial approval.
    pub async fn ensure_exists(
        &self,
        project: &Project,
        gate_id: GateId,
    ) -> DomainResult<Gate> {
        if let Some(existing) = self.gates.get(project.id, gate_id).await? {
            return Ok(existing);
        }
        let (gate, deliverables) = self.gate_from_catalog(project, gate_id)?;
        self.gates.insert(&gate).await?;
        if !deliverables.is_empty() {
            self.deliverables.insert_many(&deliverables).await?;
        }
        tracing::info!(
            project_id = %project.id,
            gate = %gate_id,
            deliverables = deliverables.len(),
            "gate created"
        );
        Ok(gate)
    }

    /// Move a PENDING gate to IN_REVIEW and announce it. Re-entrant: an
    /// IN_REVIEW gate stays put without error.
    pub async fn transition_to_review(
        &self,
        project: &Project,
        gate_id: GateId,
    ) -> DomainResult<Gate> {
        let mut gate = self.gates.get(project.id, gate_id).await?.ok_or(
            DomainError::GateNotFound { project: project.id, gate: gate_id },
        )?;
        if gate.status == GateStatus::InReview {
            return Ok(gate);
        }
        let from = gate.status;
        if let Err(reason) = gate.transition_to(GateStatus::InReview) {
            return Err(DomainError::InvalidStateTransition {
                from: from.to_string(),
                to: GateStatus::InReview.to_string(),
                reason,
            });
        }
        self.gates.update(&gate).await?;
        tracing::info!(project_id = %project.id, gate = %gate_id, "gate ready for review");
        self.events.emit(EventPayload::GateReady { project_id: project.id, gate_id });
        Ok(gate)
    }

    /// Read-only approval precondition check. Returns the first unmet
    /// condition, `None` when approval may proceed. Checked in order: actor
    /// identity, terminal/blocked status, catalog ordering, proof
    /// requirements, deliverable completeness.
    pub async fn can_approve(
        &self,
        project: &Project,
        gate_id: GateId,
        actor: &str,
    ) -> DomainResult<Option<DenialReason>> {
        if actor != project.owner {
            return Ok(Some(DenialReason::NotApprover {
                expected: project.owner.clone(),
                actual: actor.to_string(),
            }));
        }
        let gate = self.gates.get(project.id, gate_id).await?.ok_or(
            DomainError::GateNotFound { project: project.id, gate: gate_id },
        )?;
        if gate.status == GateStatus::Approved {
            return Ok(Some(DenialReason::AlreadyApproved));
        }
        if gate.status == GateStatus::Blocked {
            return Ok(Some(DenialReason::GateBlocked));
        }
        if let Some(previous) = self.catalog.previous_gate(project.category, gate_id) {
            let previous_approved = self
                .gates
                .get(project.id, previous)
                .await?
                .is_some_and(|g| g.is_approved());
            if !previous_approved {
                return Ok(Some(DenialReason::PreviousGateUnapproved { previous }));
            }
        }
        if gate.requires_proof {
            let check =
                self.tracker.proof_requirements_satisfied_for(project, gate_id).await?;
            if !check.ok {
                return Ok(Some(DenialReason::ProofsMissing {
                    missing: check.missing_types,
                }));
            }
        }
        let pending = self.tracker.incomplete_deliverables(project.id, gate_id).await?;
        if !pending.is_empty() {
            return Ok(Some(DenialReason::DeliverablesIncomplete { pending }));
        }
        Ok(None)
    }

    /// Approve a gate and advance the pipeline in one transactional unit.
    ///
    /// The token must come from the fixed accepted vocabulary; casual
    /// affirmatives are a distinct [`DomainError::AmbiguousApproval`] so a
    /// "sure" in a review never silently approves. Preconditions are
    /// re-checked here even if the caller ran [`Self::can_approve`].
    pub async fn approve(
        &self,
        project_id: Uuid,
        gate_id: GateId,
        actor: &str,
        approval_token: &str,
        notes: Option<String>,
    ) -> DomainResult<Gate> {
        let token = ApprovalToken::parse(approval_token)?;
        let mut project = self
            .projects
            .get(project_id)
            .await?
            .ok_or(DomainError::ProjectNotFound(project_id))?;
        if let Some(reason) = self.can_approve(&project, gate_id, actor).await? {
            tracing::warn!(
                project_id = %project_id,
                gate = %gate_id,
                actor = %actor,
                %reason,
                "approval denied"
            );
            return Err(DomainError::denied(gate_id, &reason));
        }
        let mut gate = self.gates.get(project_id, gate_id).await?.ok_or(
            DomainError::GateNotFound { project: project_id, gate: gate_id },
        )?;
        let from = gate.status;
        if let Err(reason) = gate.approve(actor, notes) {
            return Err(DomainError::InvalidStateTransition {
                from: from.to_string(),
                to: GateStatus::Approved.to_string(),
                reason,
            });
        }

        let next_gate_id = self.catalog.next_gate(project.category, gate_id);
        let (next_gate, next_deliverables) = match next_gate_id {
            Some(next) => {
                let (successor, deliverables) = self.gate_from_catalog(&project, next)?;
                let phase = self
                    .catalog
                    .spec(project.category, next)
                    .map(|s| s.phase.clone())
                    .unwrap_or_default();
                project.advance_to(next, phase);
                (Some(successor), deliverables)
            }
            None => {
                project.mark_complete();
                (None, Vec::new())
            }
        };

        let approval = GateApproval {
            gate: gate.clone(),
            next_gate,
            next_deliverables,
            project: project.clone(),
        };
        self.gates.commit_approval(&approval).await?;

        tracing::info!(
            project_id = %project_id,
            gate = %gate_id,
            actor = %actor,
            token = %token.as_str(),
            next_gate = ?next_gate_id,
            "gate approved"
        );
        self.events.emit(EventPayload::GateApproved {
            project_id,
            gate_id,
            actor: actor.to_string(),
            next_gate: next_gate_id,
        });
        if project.is_complete() {
            tracing::info!(project_id = %project_id, "project complete");
            self.events.emit(EventPayload::ProjectCompleted { project_id });
        }
        Ok(gate)
    }

    /// Reject a gate with a reason. No successor is created; remediation is
    /// an external concern.
    pub async fn reject(
        &self,
        project_id: Uuid,
        gate_id: GateId,
        actor: &str,
        reason: &str,
    ) -> DomainResult<Gate> {
        let project = self
            .projects
            .get(project_id)
            .await?
            .ok_or(DomainError::ProjectNotFound(project_id))?;
        if actor != project.owner {
            let denial = DenialReason::NotApprover {
                expected: project.owner.clone(),
                actual: actor.to_string(),
            };
            return Err(DomainError::denied(gate_id, &denial));
        }
        let mut gate = self.gates.get(project_id, gate_id).await?.ok_or(
            DomainError::GateNotFound { project: project_id, gate: gate_id },
        )?;
        let from = gate.status;
        if let Err(message) = gate.reject(reason) {
            return Err(DomainError::InvalidStateTransition {
                from: from.to_string(),
                to: GateStatus::Rejected.to_string(),
                reason: message,
            });
        }
        self.gates.update(&gate).await?;
        tracing::warn!(
            project_id = %project_id,
            gate = %gate_id,
            actor = %actor,
            reason = %reason,
            "gate rejected"
        );
        self.events.emit(EventPayload::GateRejected {
            project_id,
            gate_id,
            actor: actor.to_string(),
            reason: reason.to_string(),
        });
        Ok(gate)
    }

    /// Re-derive a consistent post-approval state from the gate table.
    ///
    /// The frontier is the first gate in catalog order that is not
    /// APPROVED. Recovery creates its record if missing and points the
    /// project at it; when every gate is approved the project is marked
    /// complete instead.
    pub async fn recover(&self, project_id: Uuid) -> DomainResult<RecoveryReport> {
        let mut project = self
            .projects
            .get(project_id)
            .await?
            .ok_or(DomainError::ProjectNotFound(project_id))?;
        let sequence: Vec<GateId> = self.catalog.sequence(project.category).to_vec();

        let mut frontier = GateId::Complete;
        for gate_id in sequence {
            let approved = self
                .gates
                .get(project.id, gate_id)
                .await?
                .is_some_and(|g| g.is_approved());
            if !approved {
                frontier = gate_id;
                break;
            }
        }

        let mut created_gate = false;
        if frontier != GateId::Complete
            && self.gates.get(project.id, frontier).await?.is_none()
        {
            self.ensure_exists(&project, frontier).await?;
            created_gate = true;
        }

        let mut moved_pointer = false;
        if project.current_gate != frontier {
            if frontier == GateId::Complete {
                project.mark_complete();
            } else {
                let phase = self
                    .catalog
                    .spec(project.category, frontier)
                    .map(|s| s.phase.clone())
                    .unwrap_or_else(|| project.current_phase.clone());
                project.advance_to(frontier, phase);
            }
            self.projects.update(&project).await?;
            moved_pointer = true;
            tracing::warn!(
                project_id = %project.id,
                frontier = %frontier,
                created_gate,
                "project pointer repaired"
            );
        }

        Ok(RecoveryReport { frontier, created_gate, moved_pointer })
    }
}
