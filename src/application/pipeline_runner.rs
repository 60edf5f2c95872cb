//! Event-driven pipeline advancement.
//!
//! `advance` pushes one project forward until it needs a human: the current
//! gate reached IN_REVIEW, was rejected or blocked, an escalation is
//! pending, or the project completed. `listen` wraps `advance` in an event
//! loop, resuming on every approval instead of polling timers. Neither
//! approves anything on its own.

use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{EscalationStatus, GateId, GateStatus};
use crate::domain::ports::{EscalationRepository, GateRepository, ProjectRepository};
use crate::services::event_bus::{EventBus, EventPayload};
use crate::services::gate_orchestrator::GateOrchestrator;
use crate::services::gate_state_machine::GateStateMachine;
use crate::services::task_decomposer::TaskDecomposer;

/// Upper bound on loop iterations within one `advance` call. The pointer
/// moves at most once per catalog gate, so hitting this means a cycle.
const MAX_STEPS: u32 = 16;

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunHalt {
    /// Every gate is approved and the project is marked complete.
    Complete,
    /// The gate reached IN_REVIEW and waits for an approval decision.
    AwaitingReview(GateId),
    Rejected(GateId),
    Blocked(GateId),
    /// A pending escalation needs a human before anything else runs.
    Escalated(Uuid),
    /// The run cannot make progress on its own; the reason says why.
    Stalled(String),
}

impl std::fmt::Display for RunHalt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "project complete"),
            Self::AwaitingReview(gate) => write!(f, "gate {gate} awaiting review"),
            Self::Rejected(gate) => write!(f, "gate {gate} rejected"),
            Self::Blocked(gate) => write!(f, "gate {gate} blocked"),
            Self::Escalated(id) => write!(f, "escalation {id} pending"),
            Self::Stalled(reason) => write!(f, "stalled: {reason}"),
        }
    }
}

/// What one run achieved before halting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub halt: RunHalt,
    /// Agent rounds actually executed.
    pub rounds: u32,
}

/// Drives a project through the pipeline between human decisions.
#[derive(Clone)]
pub struct PipelineRunner {
    projects: Arc<dyn ProjectRepository>,
    gates: Arc<dyn GateRepository>,
    escalations: Arc<dyn EscalationRepository>,
    orchestrator: GateOrchestrator,
    state_machine: Arc<GateStateMachine>,
    decomposer: Arc<TaskDecomposer>,
    events: Arc<EventBus>,
}

impl PipelineRunner {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        gates: Arc<dyn GateRepository>,
        escalations: Arc<dyn EscalationRepository>,
        orchestrator: GateOrchestrator,
        state_machine: Arc<GateStateMachine>,
        decomposer: Arc<TaskDecomposer>,
        events: Arc<EventBus>,
    ) -> Self {
        Self { projects, gates, escalations, orchestrator, state_machine, decomposer, events }
    }

    /// Push the project forward until a human is needed. Decomposition and
    /// recovery run first, so an interrupted approval or a missing frontier
    /// gate never wedges the run.
    pub async fn advance(&self, project_id: Uuid) -> DomainResult<RunSummary> {
        let project = self
            .projects
            .get(project_id)
            .await?
            .ok_or(DomainError::ProjectNotFound(project_id))?;
        self.decomposer.decompose(&project).await?;
        self.state_machine.recover(project_id).await?;

        let mut rounds = 0u32;
        for _ in 0..MAX_STEPS {
            let project = self
                .projects
                .get(project_id)
                .await?
                .ok_or(DomainError::ProjectNotFound(project_id))?;
            if project.is_complete() {
                return Ok(RunSummary { halt: RunHalt::Complete, rounds });
            }

            let pending = self
                .escalations
                .list_for_project(project_id, Some(EscalationStatus::Pending))
                .await?;
            if let Some(escalation) = pending.first() {
                tracing::warn!(
                    project_id = %project_id,
                    escalation_id = %escalation.id,
                    role = %escalation.role,
                    "pending escalation halts the run"
                );
                return Ok(RunSummary { halt: RunHalt::Escalated(escalation.id), rounds });
            }

            let gate_id = project.current_gate;
            let gate = self
                .gates
                .get(project_id, gate_id)
                .await?
                .ok_or(DomainError::GateNotFound { project: project_id, gate: gate_id })?;
            match gate.status {
                GateStatus::InReview => {
                    return Ok(RunSummary { halt: RunHalt::AwaitingReview(gate_id), rounds });
                }
                GateStatus::Rejected => {
                    return Ok(RunSummary { halt: RunHalt::Rejected(gate_id), rounds });
                }
                GateStatus::Blocked => {
                    return Ok(RunSummary { halt: RunHalt::Blocked(gate_id), rounds });
                }
                GateStatus::Approved => {
                    // The pointer still references an approved gate, so an
                    // approval was interrupted mid-commit. Repair and retry.
                    let report = self.state_machine.recover(project_id).await?;
                    if !report.repaired() {
                        return Ok(RunSummary {
                            halt: RunHalt::Stalled(format!(
                                "pointer stuck on approved gate {gate_id}"
                            )),
                            rounds,
                        });
                    }
                    continue;
                }
                GateStatus::Pending => {}
            }

            rounds += 1;
            let round = self.orchestrator.execute_gate_agents(project_id, gate_id).await?;
            if let Some(reason) = round.skipped {
                return Ok(RunSummary { halt: RunHalt::Stalled(reason), rounds });
            }

            let check = self.orchestrator.check_and_transition_gate(project_id, gate_id).await?;
            if check.transitioned {
                return Ok(RunSummary { halt: RunHalt::AwaitingReview(gate_id), rounds });
            }

            // The round may have raised an escalation while failing.
            let pending = self
                .escalations
                .list_for_project(project_id, Some(EscalationStatus::Pending))
                .await?;
            if let Some(escalation) = pending.first() {
                return Ok(RunSummary { halt: RunHalt::Escalated(escalation.id), rounds });
            }

            let mut reason = format!("gate {gate_id} is not ready for review");
            if !check.missing.is_empty() {
                reason.push_str(&format!(": missing {}", check.missing.join(", ")));
            }
            return Ok(RunSummary { halt: RunHalt::Stalled(reason), rounds });
        }

        Ok(RunSummary { halt: RunHalt::Stalled("step budget exhausted".to_string()), rounds })
    }

    /// Run the project until a terminal halt, resuming on every approval
    /// event. Subscribes before each `advance` so approvals landing during
    /// a pass are buffered, not lost.
    pub async fn listen(
        &self,
        project_id: Uuid,
        mut shutdown: broadcast::Receiver<()>,
    ) -> DomainResult<RunSummary> {
        let mut rounds = 0u32;
        loop {
            let mut rx = self.events.subscribe();
            let summary = self.advance(project_id).await?;
            rounds += summary.rounds;
            match summary.halt {
                RunHalt::AwaitingReview(gate_id) => {
                    tracing::info!(
                        project_id = %project_id,
                        gate = %gate_id,
                        "gate awaiting review, listening for a decision"
                    );
                }
                halt => return Ok(RunSummary { halt, rounds }),
            }

            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(event) if event.project_id == Some(project_id) => {
                            match event.payload {
                                EventPayload::GateApproved { .. } => break,
                                EventPayload::GateRejected { gate_id, .. } => {
                                    return Ok(RunSummary {
                                        halt: RunHalt::Rejected(gate_id),
                                        rounds,
                                    });
                                }
                                EventPayload::EscalationRaised { escalation_id, .. } => {
                                    return Ok(RunSummary {
                                        halt: RunHalt::Escalated(escalation_id),
                                        rounds,
                                    });
                                }
                                _ => {}
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!(
                                project_id = %project_id,
                                missed,
                                "event stream lagged, re-reading project state"
                            );
                            break;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            return Ok(RunSummary {
                                halt: RunHalt::Stalled("event bus closed".to_string()),
                                rounds,
                            });
                        }
                    },
                    _ = shutdown.recv() => {
                        tracing::info!(project_id = %project_id, "shutdown requested, leaving run loop");
                        return Ok(RunSummary {
                            halt: RunHalt::Stalled("shutdown requested".to_string()),
                            rounds,
                        });
                    }
                }
            }
        }
    }
}
