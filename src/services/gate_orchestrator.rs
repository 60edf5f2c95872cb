//! Concurrent agent fan-out for one gate.
//!
//! A gate round runs every participating role at most once, bounded by a
//! semaphore, and settles all of them before reporting. A failed execution
//! becomes a FAILED attempt row plus an event, never a propagated error, so
//! one broken role can not abort its siblings. After a round the readiness
//! check decides whether the gate may move to IN_REVIEW; nothing in here
//! approves a gate.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    latest_per_type, AgentAttempt, AttemptStatus, Deliverable, GateCatalog, GateId, GateSpec,
    GateStatus, Handoff, OrchestratorConfig, Project, ProofType, TaskStatus,
};
use crate::domain::ports::{
    AgentExecutor, AttemptRepository, DeliverableRepository, DocumentGenerator, GateRepository,
    HandoffRepository, ProjectRepository, ProofRepository, TaskRepository, Validator,
};
use crate::services::event_bus::{EventBus, EventPayload};
use crate::services::gate_state_machine::GateStateMachine;
use crate::services::progress_tracker::{evaluate_proofs, role_proofs_satisfied, ProgressTracker};
use crate::services::self_healing::SelfHealingService;

/// Result of one role's execution within a gate round.
#[derive(Debug, Clone)]
pub struct RoleOutcome {
    pub role: String,
    pub attempt_id: Uuid,
    pub status: AttemptStatus,
    pub error: Option<String>,
    /// The self-healing hook ran after this role and ended on a clean
    /// validation pass.
    pub repaired: bool,
}

/// Outcome of one fan-out round across a gate's roles.
#[derive(Debug, Clone)]
pub struct GateRound {
    pub gate_id: GateId,
    pub outcomes: Vec<RoleOutcome>,
    /// Set when the round never ran, with the reason.
    pub skipped: Option<String>,
}

impl GateRound {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status == AttemptStatus::Completed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status == AttemptStatus::Failed).count()
    }
}

/// Readiness snapshot produced by `check_and_transition_gate`.
#[derive(Debug, Clone)]
pub struct GateCheck {
    pub gate_id: GateId,
    pub status: GateStatus,
    /// True when this call moved the gate from PENDING to IN_REVIEW.
    pub transitioned: bool,
    pub deliverables_ok: bool,
    pub proofs_ok: bool,
    /// Incomplete deliverable names and unmet proof types.
    pub missing: Vec<String>,
    /// A required proof's latest artifact exists but failed. A repair run
    /// could flip it without re-running the whole role.
    pub repair_candidate: bool,
}

/// Runs gate rounds and the readiness check between them.
#[derive(Clone)]
pub struct GateOrchestrator {
    projects: Arc<dyn ProjectRepository>,
    gates: Arc<dyn GateRepository>,
    deliverables: Arc<dyn DeliverableRepository>,
    proofs: Arc<dyn ProofRepository>,
    tasks: Arc<dyn TaskRepository>,
    attempts: Arc<dyn AttemptRepository>,
    handoffs: Arc<dyn HandoffRepository>,
    executor: Arc<dyn AgentExecutor>,
    documents: Arc<dyn DocumentGenerator>,
    validator: Arc<dyn Validator>,
    state_machine: Arc<GateStateMachine>,
    tracker: Arc<ProgressTracker>,
    self_heal: Arc<SelfHealingService>,
    catalog: Arc<GateCatalog>,
    events: Arc<EventBus>,
    config: OrchestratorConfig,
}

impl GateOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        gates: Arc<dyn GateRepository>,
        deliverables: Arc<dyn DeliverableRepository>,
        proofs: Arc<dyn ProofRepository>,
        tasks: Arc<dyn TaskRepository>,
        attempts: Arc<dyn AttemptRepository>,
        handoffs: Arc<dyn HandoffRepository>,
        executor: Arc<dyn AgentExecutor>,
        documents: Arc<dyn DocumentGenerator>,
        validator: Arc<dyn Validator>,
        state_machine: Arc<GateStateMachine>,
        tracker: Arc<ProgressTracker>,
        self_heal: Arc<SelfHealingService>,
        catalog: Arc<GateCatalog>,
        events: Arc<EventBus>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            projects,
            gates,
            deliverables,
            proofs,
            tasks,
            attempts,
            handoffs,
            executor,
            documents,
            validator,
            state_machine,
            tracker,
            self_heal,
            catalog,
            events,
            config,
        }
    }

    /// Run one round of agents for a gate: every participating role once,
    /// concurrently, bounded by `max_concurrency`. Human-only gates are a
    /// no-op. An unmet entry guard skips the round instead of failing it.
    pub async fn execute_gate_agents(
        &self,
        project_id: Uuid,
        gate_id: GateId,
    ) -> DomainResult<GateRound> {
        let project = self
            .projects
            .get(project_id)
            .await?
            .ok_or(DomainError::ProjectNotFound(project_id))?;
        let spec = self
            .catalog
            .spec(project.category, gate_id)
            .ok_or(DomainError::CatalogEntryMissing { category: project.category, gate: gate_id })?
            .clone();

        if spec.roles.is_empty() {
            tracing::debug!(project_id = %project_id, gate = %gate_id, "human-only gate, no agents to run");
            return Ok(GateRound { gate_id, outcomes: Vec::new(), skipped: None });
        }

        self.state_machine.ensure_exists(&project, gate_id).await?;

        if let Some(required) = spec.entry_requires {
            let approved = self
                .gates
                .get(project_id, required)
                .await?
                .is_some_and(|gate| gate.is_approved());
            if !approved {
                let reason = format!("entry guard unmet: gate {required} is not approved");
                tracing::warn!(project_id = %project_id, gate = %gate_id, %reason, "skipping gate round");
                self.events.emit(EventPayload::GateRoundSkipped {
                    project_id,
                    gate_id,
                    reason: reason.clone(),
                });
                return Ok(GateRound { gate_id, outcomes: Vec::new(), skipped: Some(reason) });
            }
        }

        let outcomes = self.fan_out(&project, &spec).await;

        let round = GateRound { gate_id, outcomes, skipped: None };
        tracing::info!(
            project_id = %project_id,
            gate = %gate_id,
            completed = round.completed(),
            failed = round.failed(),
            "gate round settled"
        );
        self.events.emit(EventPayload::GateRoundCompleted {
            project_id,
            gate_id,
            completed: round.completed(),
            failed: round.failed(),
        });
        Ok(round)
    }

    /// Evaluate gate readiness and move a PENDING gate to IN_REVIEW when
    /// every deliverable and proof condition holds. Safe to call again after
    /// the transition: the check reports the current status and does nothing.
    pub async fn check_and_transition_gate(
        &self,
        project_id: Uuid,
        gate_id: GateId,
    ) -> DomainResult<GateCheck> {
        let project = self
            .projects
            .get(project_id)
            .await?
            .ok_or(DomainError::ProjectNotFound(project_id))?;
        let spec = self
            .catalog
            .spec(project.category, gate_id)
            .ok_or(DomainError::CatalogEntryMissing { category: project.category, gate: gate_id })?
            .clone();
        let gate = self
            .gates
            .get(project_id, gate_id)
            .await?
            .ok_or(DomainError::GateNotFound { project: project_id, gate: gate_id })?;

        if gate.status != GateStatus::Pending {
            return Ok(GateCheck {
                gate_id,
                status: gate.status,
                transitioned: false,
                deliverables_ok: true,
                proofs_ok: true,
                missing: Vec::new(),
                repair_candidate: false,
            });
        }

        let rows = self.deliverables.list_for_gate(project_id, gate_id).await?;
        let deliverables_ok = if rows.is_empty() {
            // No deliverable rows were ever seeded for this gate. Fall back
            // to "every participating role has completed with output".
            self.roles_completed_with_output(project_id, gate_id, &spec.roles).await?
        } else {
            rows.iter().all(Deliverable::is_complete)
        };
        let mut missing: Vec<String> =
            rows.iter().filter(|d| !d.is_complete()).map(|d| d.name.clone()).collect();

        let mut proofs_ok = true;
        let mut repair_candidate = false;
        if spec.requires_proof {
            let artifacts = self.proofs.list_for_gate(project_id, gate_id).await?;
            let gate_wide = evaluate_proofs(&spec, &artifacts);
            let latest = latest_per_type(&artifacts);
            repair_candidate = gate_wide.missing_types.iter().any(|name| {
                ProofType::from_str(name)
                    .map_or_else(|| !artifacts.is_empty(), |pt| latest.contains_key(&pt))
            });
            proofs_ok = gate_wide.ok;
            missing.extend(gate_wide.missing_types);
            for role in &spec.roles {
                if !role_proofs_satisfied(&spec, &artifacts, role) {
                    proofs_ok = false;
                    missing.push(format!("role proofs for {role}"));
                }
            }
        }

        let mut status = gate.status;
        let mut transitioned = false;
        if deliverables_ok && proofs_ok {
            let updated = self.state_machine.transition_to_review(&project, gate_id).await?;
            transitioned = updated.status == GateStatus::InReview;
            status = updated.status;
        } else {
            tracing::debug!(
                project_id = %project_id,
                gate = %gate_id,
                deliverables_ok,
                proofs_ok,
                missing = ?missing,
                "gate not ready for review"
            );
        }

        Ok(GateCheck {
            gate_id,
            status,
            transitioned,
            deliverables_ok,
            proofs_ok,
            missing,
            repair_candidate,
        })
    }

    /// Re-run the agent round for a gate that is still PENDING. Anything
    /// else is denied: retrying an IN_REVIEW or terminal gate would
    /// double-spend agent work.
    pub async fn retry_gate_agents(
        &self,
        project_id: Uuid,
        gate_id: GateId,
        actor: &str,
    ) -> DomainResult<GateRound> {
        let gate = self
            .gates
            .get(project_id, gate_id)
            .await?
            .ok_or(DomainError::GateNotFound { project: project_id, gate: gate_id })?;
        if gate.status != GateStatus::Pending {
            return Err(DomainError::TransitionDenied {
                gate: gate_id,
                reason: format!("only a pending gate can be retried, gate is {}", gate.status),
            });
        }
        tracing::info!(project_id = %project_id, gate = %gate_id, actor = %actor, "gate round retry requested");
        self.execute_gate_agents(project_id, gate_id).await
    }

    /// Scan PENDING gates, newest first, for one with a FAILED attempt and
    /// nothing currently running. Such a gate makes no progress on its own
    /// and needs a retry or a human.
    pub async fn detect_stuck_gate(&self, project_id: Uuid) -> DomainResult<Option<GateId>> {
        let gates = self.gates.list_for_project(project_id).await?;
        for gate in gates.iter().rev().filter(|g| g.status == GateStatus::Pending) {
            let attempts = self.attempts.list_for_gate(project_id, gate.gate_id).await?;
            let has_failed = attempts.iter().any(|a| a.status == AttemptStatus::Failed);
            if !has_failed {
                continue;
            }
            if self.attempts.any_running(project_id, gate.gate_id).await? {
                continue;
            }
            tracing::warn!(project_id = %project_id, gate = %gate.gate_id, "stuck gate detected");
            self.events.emit(EventPayload::StuckGateDetected {
                project_id,
                gate_id: gate.gate_id,
            });
            return Ok(Some(gate.gate_id));
        }
        Ok(None)
    }

    async fn fan_out(&self, project: &Project, spec: &GateSpec) -> Vec<RoleOutcome> {
        if spec.roles.len() == 1 {
            return vec![self.run_role(project, spec, &spec.roles[0]).await];
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut handles = Vec::with_capacity(spec.roles.len());
        for role in &spec.roles {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                // The semaphore is never closed.
                continue;
            };
            let orchestrator = self.clone();
            let project = project.clone();
            let spec = spec.clone();
            let role = role.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                orchestrator.run_role(&project, &spec, &role).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for result in futures::future::join_all(handles).await {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    tracing::error!(project_id = %project.id, error = %err, "role task panicked");
                }
            }
        }
        outcomes
    }

    /// Execute one role end to end. Every path lands in exactly one
    /// terminal attempt state; errors become outcomes, not surprises for
    /// sibling roles.
    async fn run_role(&self, project: &Project, spec: &GateSpec, role: &str) -> RoleOutcome {
        let gate_id = spec.gate_id;
        let system_context = self.role_context(project, role).await;
        let prompt = role_prompt(project, spec, role);

        let mut attempt = AgentAttempt::start(project.id, gate_id, role, input_summary(&prompt));
        if let Err(err) = self.attempts.insert(&attempt).await {
            tracing::error!(project_id = %project.id, gate = %gate_id, role = %role, error = %err, "could not record attempt");
            return RoleOutcome {
                role: role.to_string(),
                attempt_id: attempt.id,
                status: AttemptStatus::Failed,
                error: Some(err.to_string()),
                repaired: false,
            };
        }
        self.events.emit(EventPayload::AgentStarted {
            project_id: project.id,
            gate_id,
            role: role.to_string(),
            attempt_id: attempt.id,
        });
        tracing::info!(project_id = %project.id, gate = %gate_id, role = %role, "agent started");

        let budget = Duration::from_secs(self.config.execution_timeout_secs);
        let execution = timeout(budget, self.executor.execute(role, &system_context, &prompt)).await;

        match execution {
            Ok(Ok(outcome)) if outcome.success => {
                attempt.complete(
                    outcome.content.clone(),
                    outcome.input_tokens,
                    outcome.output_tokens,
                );
                if let Err(err) = self.attempts.update(&attempt).await {
                    tracing::error!(project_id = %project.id, role = %role, error = %err, "could not persist completed attempt");
                }
                let repaired =
                    self.post_process_success(project, spec, role, &mut attempt, &outcome.content).await;
                self.events.emit(EventPayload::AgentCompleted {
                    project_id: project.id,
                    gate_id,
                    role: role.to_string(),
                    attempt_id: attempt.id,
                    tokens_used: attempt.total_tokens(),
                });
                tracing::info!(
                    project_id = %project.id,
                    gate = %gate_id,
                    role = %role,
                    tokens = attempt.total_tokens(),
                    "agent completed"
                );
                RoleOutcome {
                    role: role.to_string(),
                    attempt_id: attempt.id,
                    status: AttemptStatus::Completed,
                    error: None,
                    repaired,
                }
            }
            other => {
                let error = match other {
                    Err(_) => format!(
                        "execution timed out after {}s",
                        self.config.execution_timeout_secs
                    ),
                    Ok(Err(err)) => err.to_string(),
                    Ok(Ok(outcome)) => {
                        outcome.error.unwrap_or_else(|| "agent reported failure".to_string())
                    }
                };
                self.settle_failed_role(project, gate_id, role, attempt, error).await
            }
        }
    }

    /// Completion side effects: progress marks, documents, handoff, proofs.
    /// Returns whether a self-healing pass ran and came back clean.
    async fn post_process_success(
        &self,
        project: &Project,
        spec: &GateSpec,
        role: &str,
        attempt: &mut AgentAttempt,
        content: &str,
    ) -> bool {
        let gate_id = spec.gate_id;
        if let Err(err) = self.tracker.mark_deliverables_complete(project.id, gate_id, role).await {
            tracing::error!(project_id = %project.id, role = %role, error = %err, "could not mark deliverables");
        }
        if let Err(err) =
            self.tasks.set_status_for_role(project.id, role, TaskStatus::Complete).await
        {
            tracing::error!(project_id = %project.id, role = %role, error = %err, "could not close tasks");
        }

        match self.documents.generate_from_output(project.id, role, content).await {
            Ok(documents) if !documents.is_empty() => {
                tracing::debug!(project_id = %project.id, role = %role, documents = documents.len(), "documents generated");
            }
            Ok(_) => {}
            Err(err) => {
                // Document generation is best effort; record the miss on the
                // attempt and keep going.
                attempt.annotate(format!("document generation failed: {err}"));
                if let Err(update_err) = self.attempts.update(attempt).await {
                    tracing::error!(project_id = %project.id, error = %update_err, "could not persist attempt warning");
                }
                tracing::warn!(project_id = %project.id, role = %role, error = %err, "document generation failed");
            }
        }

        self.record_handoff_from_output(project, spec, role, content).await;

        let mut repaired = false;
        if spec.requires_proof && !spec.role_proofs.is_empty() {
            match self.validate_and_record_proofs(project, spec, role).await {
                Ok(true) => {}
                Ok(false) => {
                    repaired = self.try_self_heal(project, role, attempt.id).await;
                    if repaired {
                        // The repair loop ended on a clean validation run;
                        // refresh the role's artifacts so the gate check
                        // sees passing latest entries.
                        if let Err(err) =
                            self.validate_and_record_proofs(project, spec, role).await
                        {
                            tracing::warn!(project_id = %project.id, role = %role, error = %err, "could not re-record proofs after repair");
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(project_id = %project.id, role = %role, error = %err, "validation pass failed");
                }
            }
        }
        repaired
    }

    /// Record the failure, then consult the retry budget before handing the
    /// attempt to self-healing. Exhausted budgets leave the gate for
    /// `detect_stuck_gate` and a human retry.
    async fn settle_failed_role(
        &self,
        project: &Project,
        gate_id: GateId,
        role: &str,
        mut attempt: AgentAttempt,
        error: String,
    ) -> RoleOutcome {
        attempt.fail(error.clone());
        if let Err(err) = self.attempts.update(&attempt).await {
            tracing::error!(project_id = %project.id, role = %role, error = %err, "could not persist failed attempt");
        }
        tracing::warn!(project_id = %project.id, gate = %gate_id, role = %role, error = %error, "agent execution failed");
        self.events.emit(EventPayload::AgentFailed {
            project_id: project.id,
            gate_id,
            role: role.to_string(),
            attempt_id: attempt.id,
            error: error.clone(),
        });

        let repaired = if self.within_retry_budget(project, gate_id, role).await {
            self.try_self_heal(project, role, attempt.id).await
        } else {
            false
        };

        RoleOutcome {
            role: role.to_string(),
            attempt_id: attempt.id,
            status: AttemptStatus::Failed,
            error: Some(error),
            repaired,
        }
    }

    async fn within_retry_budget(&self, project: &Project, gate_id: GateId, role: &str) -> bool {
        let since = self
            .config
            .retry_budget
            .window_minutes
            .map(|minutes| Utc::now() - chrono::Duration::minutes(minutes));
        let failed = match self.attempts.count_failed(project.id, gate_id, role, since).await {
            Ok(count) => count,
            Err(err) => {
                tracing::error!(project_id = %project.id, role = %role, error = %err, "could not count failed attempts");
                return false;
            }
        };
        let budget = u64::from(self.config.retry_budget.max_failed_attempts);
        if failed > budget {
            tracing::warn!(
                project_id = %project.id,
                gate = %gate_id,
                role = %role,
                failed,
                budget,
                "retry budget exhausted, leaving gate for human retry"
            );
            return false;
        }
        true
    }

    async fn try_self_heal(&self, project: &Project, role: &str, attempt_id: Uuid) -> bool {
        match self.self_heal.auto_retry_on_build_failure(project.id, attempt_id, "orchestrator").await
        {
            Ok(repaired) => repaired,
            Err(err) => {
                tracing::warn!(project_id = %project.id, role = %role, error = %err, "self-healing hook failed");
                false
            }
        }
    }

    /// One validation pass, recorded as per-role proof artifacts for the
    /// types the validator can attest. Security and runtime signals come
    /// from their own tools and are recorded externally.
    async fn validate_and_record_proofs(
        &self,
        project: &Project,
        spec: &GateSpec,
        role: &str,
    ) -> DomainResult<bool> {
        let report = self.validator.run_full_validation(project.id).await?;
        let mut all_passed = true;
        for proof_type in &spec.role_proofs {
            let errors = match proof_type {
                ProofType::Build => &report.build_errors,
                ProofType::Lint => &report.lint_errors,
                ProofType::Test => &report.test_errors,
                ProofType::SecurityScan | ProofType::Runtime => continue,
            };
            let passed = errors.is_empty();
            all_passed &= passed;
            self.tracker
                .record_proof(
                    project.id,
                    spec.gate_id,
                    *proof_type,
                    passed,
                    proof_summary(errors),
                    role,
                )
                .await?;
        }
        Ok(all_passed)
    }

    async fn record_handoff_from_output(
        &self,
        project: &Project,
        spec: &GateSpec,
        role: &str,
        content: &str,
    ) {
        let Some(to_role) = detect_handoff(content) else {
            return;
        };
        let known = self.catalog.known_roles(project.category);
        if !known.iter().any(|r| r == &to_role) {
            tracing::warn!(project_id = %project.id, from_role = %role, to_role = %to_role, "handoff names an unknown role, ignoring");
            return;
        }
        let deliverables: Vec<String> = spec
            .deliverables
            .iter()
            .filter(|d| d.role == role)
            .map(|d| d.name.clone())
            .collect();
        let handoff = Handoff::new(project.id, role, to_role.clone(), spec.phase.clone())
            .with_deliverables(deliverables);
        if let Err(err) = self.handoffs.insert(&handoff).await {
            tracing::error!(project_id = %project.id, from_role = %role, error = %err, "could not record handoff");
            return;
        }
        self.events.emit(EventPayload::HandoffRecorded {
            project_id: project.id,
            from_role: role.to_string(),
            to_role,
        });
    }

    async fn role_context(&self, project: &Project, role: &str) -> String {
        match self.handoffs.latest_for_role(project.id, role).await {
            Ok(Some(handoff)) => {
                let deliverables = if handoff.deliverables.is_empty() {
                    "none listed".to_string()
                } else {
                    handoff.deliverables.join(", ")
                };
                let notes =
                    if handoff.notes.is_empty() { "none" } else { handoff.notes.as_str() };
                format!(
                    "Handoff from {} during the {} phase. Deliverables: {}. Notes: {}",
                    handoff.from_role, handoff.phase, deliverables, notes
                )
            }
            Ok(None) => format!(
                "No prior handoff. Start from the approved artifacts of project '{}'.",
                project.name
            ),
            Err(err) => {
                tracing::warn!(project_id = %project.id, role = %role, error = %err, "could not load handoff context");
                format!("Start from the approved artifacts of project '{}'.", project.name)
            }
        }
    }

    async fn roles_completed_with_output(
        &self,
        project_id: Uuid,
        gate_id: GateId,
        roles: &[String],
    ) -> DomainResult<bool> {
        if roles.is_empty() {
            return Ok(true);
        }
        let attempts = self.attempts.list_for_gate(project_id, gate_id).await?;
        Ok(roles.iter().all(|role| {
            attempts.iter().any(|a| {
                a.role == *role && a.status == AttemptStatus::Completed && a.output.is_some()
            })
        }))
    }
}

fn role_prompt(project: &Project, spec: &GateSpec, role: &str) -> String {
    let mut prompt = format!(
        "Project '{}' is at gate {} ({}), phase {}. You are the {}.\n",
        project.name, spec.gate_id, spec.name, spec.phase, role
    );
    let owed: Vec<&str> = spec
        .deliverables
        .iter()
        .filter(|d| d.role == role)
        .map(|d| d.name.as_str())
        .collect();
    if !owed.is_empty() {
        prompt.push_str(&format!("Produce: {}.\n", owed.join(", ")));
    }
    prompt.push_str(&format!("Passing criteria: {}\n", spec.passing_criteria));
    prompt
}

/// Output lines like `handoff: qa-engineer` name the next role to brief.
fn detect_handoff(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let trimmed = line.trim();
        let prefix = trimmed.get(..8)?;
        if !prefix.eq_ignore_ascii_case("handoff:") {
            return None;
        }
        let role = trimmed[8..].trim();
        if role.is_empty() {
            None
        } else {
            Some(role.to_string())
        }
    })
}

fn proof_summary(errors: &[String]) -> String {
    match errors.len() {
        0 => "clean".to_string(),
        1 => errors[0].clone(),
        n => format!("{} (+{} more)", errors[0], n - 1),
    }
}

fn input_summary(prompt: &str) -> String {
    prompt.lines().next().unwrap_or_default().chars().take(160).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::adapters::agents::{MockAgentExecutor, ScriptedOutcome};
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteAttemptRepository, SqliteDeliverableRepository,
        SqliteEscalationRepository, SqliteGateRepository, SqliteHandoffRepository,
        SqliteProjectRepository, SqliteProofRepository, SqliteTaskRepository,
    };
    use crate::adapters::validation::MockValidator;
    use crate::adapters::workspace::MockWorkspace;
    use crate::domain::models::{
        CategoryPlan, Gate, ProjectCategory, SelfHealConfig,
    };
    use crate::domain::ports::{NullDocumentGenerator, ValidationReport};

    struct Fixture {
        orchestrator: GateOrchestrator,
        projects: Arc<dyn ProjectRepository>,
        gates: Arc<dyn GateRepository>,
        deliverables: Arc<dyn DeliverableRepository>,
        attempts: Arc<dyn AttemptRepository>,
        handoffs: Arc<dyn HandoffRepository>,
        executor: Arc<MockAgentExecutor>,
        validator: Arc<MockValidator>,
        tracker: Arc<ProgressTracker>,
        catalog: Arc<GateCatalog>,
        events: Arc<EventBus>,
    }

    async fn fixture_with(catalog: GateCatalog, config: OrchestratorConfig) -> Fixture {
        let pool = create_migrated_test_pool().await.unwrap();
        let projects: Arc<dyn ProjectRepository> =
            Arc::new(SqliteProjectRepository::new(pool.clone()));
        let gates: Arc<dyn GateRepository> = Arc::new(SqliteGateRepository::new(pool.clone()));
        let deliverables: Arc<dyn DeliverableRepository> =
            Arc::new(SqliteDeliverableRepository::new(pool.clone()));
        let proofs: Arc<dyn ProofRepository> = Arc::new(SqliteProofRepository::new(pool.clone()));
        let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let attempts: Arc<dyn AttemptRepository> =
            Arc::new(SqliteAttemptRepository::new(pool.clone()));
        let handoffs: Arc<dyn HandoffRepository> =
            Arc::new(SqliteHandoffRepository::new(pool.clone()));
        let escalations: Arc<dyn crate::domain::ports::EscalationRepository> =
            Arc::new(SqliteEscalationRepository::new(pool));

        let executor = Arc::new(MockAgentExecutor::new());
        let validator = Arc::new(MockValidator::new());
        let workspace = Arc::new(MockWorkspace::new());
        let catalog = Arc::new(catalog);
        let events = Arc::new(EventBus::default());

        let tracker = Arc::new(ProgressTracker::new(
            deliverables.clone(),
            proofs.clone(),
            catalog.clone(),
            events.clone(),
        ));
        let state_machine = Arc::new(GateStateMachine::new(
            projects.clone(),
            gates.clone(),
            deliverables.clone(),
            tracker.clone(),
            catalog.clone(),
            events.clone(),
        ));
        let self_heal = Arc::new(SelfHealingService::new(
            projects.clone(),
            attempts.clone(),
            handoffs.clone(),
            escalations,
            executor.clone(),
            workspace,
            validator.clone(),
            catalog.clone(),
            events.clone(),
            SelfHealConfig::default(),
        ));
        let orchestrator = GateOrchestrator::new(
            projects.clone(),
            gates.clone(),
            deliverables.clone(),
            proofs,
            tasks,
            attempts.clone(),
            handoffs.clone(),
            executor.clone(),
            Arc::new(NullDocumentGenerator),
            validator.clone(),
            state_machine,
            tracker.clone(),
            self_heal,
            catalog.clone(),
            events.clone(),
            config,
        );

        Fixture {
            orchestrator,
            projects,
            gates,
            deliverables,
            attempts,
            handoffs,
            executor,
            validator,
            tracker,
            catalog,
            events,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(GateCatalog::builtin(), OrchestratorConfig::default()).await
    }

    async fn project_at(fx: &Fixture, gate_id: GateId) -> Project {
        let spec = fx.catalog.spec(ProjectCategory::Standard, gate_id).unwrap();
        let project =
            Project::new("webshop", ProjectCategory::Standard, "alice", gate_id, spec.phase.clone());
        fx.projects.insert(&project).await.unwrap();
        project
    }

    async fn approved_gate(fx: &Fixture, project: &Project, gate_id: GateId) {
        let mut gate = Gate::new(project.id, gate_id);
        gate.approve("alice", None).unwrap();
        fx.gates.insert(&gate).await.unwrap();
    }

    fn single_role_catalog(role: &str) -> GateCatalog {
        let plan = CategoryPlan {
            sequence: vec![GateId::G1],
            gates: vec![GateSpec {
                gate_id: GateId::G1,
                name: "Intake".to_string(),
                phase: "intake".to_string(),
                roles: vec![role.to_string()],
                deliverables: Vec::new(),
                requires_proof: false,
                required_proofs: Vec::new(),
                role_proofs: Vec::new(),
                entry_requires: None,
                passing_criteria: "reviewed".to_string(),
            }],
            tasks: Vec::new(),
            parallel_groups: Vec::new(),
        };
        let mut plans = HashMap::new();
        plans.insert(ProjectCategory::Standard, plan);
        GateCatalog::new(plans)
    }

    #[tokio::test]
    async fn human_only_gate_runs_no_agents() {
        let fx = fixture().await;
        let project = project_at(&fx, GateId::G9).await;

        let round = fx.orchestrator.execute_gate_agents(project.id, GateId::G9).await.unwrap();

        assert!(round.outcomes.is_empty());
        assert!(round.skipped.is_none());
        assert_eq!(fx.executor.total_calls().await, 0);
    }

    #[tokio::test]
    async fn unmet_entry_guard_skips_the_round() {
        let fx = fixture().await;
        let project = project_at(&fx, GateId::G4).await;
        let mut rx = fx.events.subscribe();

        let round = fx.orchestrator.execute_gate_agents(project.id, GateId::G4).await.unwrap();

        assert!(round.outcomes.is_empty());
        assert!(round.skipped.as_deref().unwrap().contains("G3"));
        assert_eq!(fx.executor.total_calls().await, 0);

        // The gate row itself still exists for later rounds.
        let gate = fx.gates.get(project.id, GateId::G4).await.unwrap().unwrap();
        assert_eq!(gate.status, GateStatus::Pending);

        let mut skipped = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event.payload, EventPayload::GateRoundSkipped { gate_id: GateId::G4, .. }) {
                skipped = true;
            }
        }
        assert!(skipped);
    }

    #[tokio::test]
    async fn fan_out_settles_all_roles_and_readies_the_gate() {
        let fx = fixture().await;
        let project = project_at(&fx, GateId::G4).await;
        approved_gate(&fx, &project, GateId::G3).await;

        let round = fx.orchestrator.execute_gate_agents(project.id, GateId::G4).await.unwrap();
        assert_eq!(round.completed(), 2);
        assert_eq!(round.failed(), 0);

        for role in ["backend-developer", "frontend-developer"] {
            assert_eq!(fx.executor.call_count(role).await, 1);
        }
        let rows = fx.deliverables.list_for_gate(project.id, GateId::G4).await.unwrap();
        assert!(rows.iter().all(Deliverable::is_complete));

        // Both roles recorded their build and lint artifacts, but the
        // gate-wide runtime proof is still missing.
        let check =
            fx.orchestrator.check_and_transition_gate(project.id, GateId::G4).await.unwrap();
        assert!(check.deliverables_ok);
        assert!(!check.proofs_ok);
        assert!(!check.transitioned);
        assert!(check.missing.iter().any(|m| m == "runtime"));
        assert!(!check.repair_candidate);

        fx.tracker
            .record_proof(project.id, GateId::G4, ProofType::Runtime, true, "smoke ok", "validator")
            .await
            .unwrap();
        let check =
            fx.orchestrator.check_and_transition_gate(project.id, GateId::G4).await.unwrap();
        assert!(check.transitioned);
        assert_eq!(check.status, GateStatus::InReview);
    }

    #[tokio::test]
    async fn failed_role_blocks_the_gate_transition() {
        let fx = fixture().await;
        let project = project_at(&fx, GateId::G4).await;
        approved_gate(&fx, &project, GateId::G3).await;
        fx.executor
            .set_outcome_for_role("frontend-developer", ScriptedOutcome::failure("frontend exploded"))
            .await;
        let mut rx = fx.events.subscribe();

        let round = fx.orchestrator.execute_gate_agents(project.id, GateId::G4).await.unwrap();
        assert_eq!(round.completed(), 1);
        assert_eq!(round.failed(), 1);
        let failed = round
            .outcomes
            .iter()
            .find(|o| o.status == AttemptStatus::Failed)
            .unwrap();
        assert_eq!(failed.role, "frontend-developer");
        assert!(failed.error.as_deref().unwrap().contains("frontend exploded"));

        let check =
            fx.orchestrator.check_and_transition_gate(project.id, GateId::G4).await.unwrap();
        assert!(!check.deliverables_ok);
        assert!(!check.transitioned);
        assert_eq!(check.status, GateStatus::Pending);
        assert!(check.missing.iter().any(|m| m == "frontend-source"));

        let mut agent_failed = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event.payload, EventPayload::AgentFailed { .. }) {
                agent_failed = true;
            }
        }
        assert!(agent_failed);
    }

    #[tokio::test]
    async fn failing_proof_marks_a_repair_candidate() {
        let fx = fixture().await;
        let project = project_at(&fx, GateId::G5).await;
        fx.validator
            .queue_reports(vec![ValidationReport {
                overall_success: false,
                test_errors: vec!["assertion failed: totals".to_string()],
                ..ValidationReport::default()
            }])
            .await;

        let round = fx.orchestrator.execute_gate_agents(project.id, GateId::G5).await.unwrap();
        assert_eq!(round.completed(), 1);

        let check =
            fx.orchestrator.check_and_transition_gate(project.id, GateId::G5).await.unwrap();
        assert!(check.deliverables_ok);
        assert!(!check.proofs_ok);
        assert!(!check.transitioned);
        assert!(check.missing.iter().any(|m| m == "test"));
        assert!(check.repair_candidate);
    }

    #[tokio::test]
    async fn check_is_idempotent_once_in_review() {
        let fx = fixture().await;
        let project = project_at(&fx, GateId::G1).await;

        fx.orchestrator.execute_gate_agents(project.id, GateId::G1).await.unwrap();
        let first =
            fx.orchestrator.check_and_transition_gate(project.id, GateId::G1).await.unwrap();
        assert!(first.transitioned);
        assert_eq!(first.status, GateStatus::InReview);

        let second =
            fx.orchestrator.check_and_transition_gate(project.id, GateId::G1).await.unwrap();
        assert!(!second.transitioned);
        assert_eq!(second.status, GateStatus::InReview);
    }

    #[tokio::test]
    async fn completed_attempts_stand_in_for_missing_deliverable_rows() {
        let fx = fixture_with(single_role_catalog("analyst"), OrchestratorConfig::default()).await;
        let project = project_at(&fx, GateId::G1).await;

        let check =
            fx.orchestrator.check_and_transition_gate(project.id, GateId::G1).await;
        assert!(check.is_err(), "gate row does not exist yet");

        fx.orchestrator.execute_gate_agents(project.id, GateId::G1).await.unwrap();
        assert!(fx.deliverables.list_for_gate(project.id, GateId::G1).await.unwrap().is_empty());

        let check =
            fx.orchestrator.check_and_transition_gate(project.id, GateId::G1).await.unwrap();
        assert!(check.deliverables_ok);
        assert!(check.transitioned);
    }

    #[tokio::test]
    async fn stuck_gate_surfaces_and_clears_after_retry() {
        let fx = fixture().await;
        let project = project_at(&fx, GateId::G1).await;
        fx.executor
            .queue_outcomes_for_role("requirements-analyst", vec![ScriptedOutcome::failure("flaked")])
            .await;
        let mut rx = fx.events.subscribe();

        let round = fx.orchestrator.execute_gate_agents(project.id, GateId::G1).await.unwrap();
        assert_eq!(round.failed(), 1);

        let stuck = fx.orchestrator.detect_stuck_gate(project.id).await.unwrap();
        assert_eq!(stuck, Some(GateId::G1));
        let mut detected = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event.payload, EventPayload::StuckGateDetected { gate_id: GateId::G1, .. }) {
                detected = true;
            }
        }
        assert!(detected);

        // The queued failure is drained; the retry falls back to the
        // default success outcome.
        let round =
            fx.orchestrator.retry_gate_agents(project.id, GateId::G1, "alice").await.unwrap();
        assert_eq!(round.completed(), 1);
        let check =
            fx.orchestrator.check_and_transition_gate(project.id, GateId::G1).await.unwrap();
        assert!(check.transitioned);

        assert_eq!(fx.orchestrator.detect_stuck_gate(project.id).await.unwrap(), None);

        let err =
            fx.orchestrator.retry_gate_agents(project.id, GateId::G1, "alice").await.unwrap_err();
        assert!(matches!(err, DomainError::TransitionDenied { gate: GateId::G1, .. }));
    }

    #[tokio::test]
    async fn slow_agent_times_out_into_a_failed_attempt() {
        let config = OrchestratorConfig { execution_timeout_secs: 1, ..Default::default() };
        let fx = fixture_with(GateCatalog::builtin(), config).await;
        let project = project_at(&fx, GateId::G1).await;
        fx.executor
            .set_outcome_for_role(
                "requirements-analyst",
                ScriptedOutcome::success("slow brief").with_delay_ms(5_000),
            )
            .await;

        let round = fx.orchestrator.execute_gate_agents(project.id, GateId::G1).await.unwrap();
        assert_eq!(round.failed(), 1);
        assert!(round.outcomes[0].error.as_deref().unwrap().contains("timed out"));

        let attempts = fx.attempts.list_for_gate(project.id, GateId::G1).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Failed);
    }

    #[tokio::test]
    async fn handoff_lines_in_output_brief_the_next_role() {
        let fx = fixture().await;
        let project = project_at(&fx, GateId::G1).await;
        fx.executor
            .set_outcome_for_role(
                "requirements-analyst",
                ScriptedOutcome::success("brief written\nHandoff: spec-writer\ndone"),
            )
            .await;

        fx.orchestrator.execute_gate_agents(project.id, GateId::G1).await.unwrap();

        let handoff =
            fx.handoffs.latest_for_role(project.id, "spec-writer").await.unwrap().unwrap();
        assert_eq!(handoff.from_role, "requirements-analyst");
        assert!(handoff.deliverables.contains(&"requirements-brief".to_string()));
    }

    #[tokio::test]
    async fn handoffs_to_unknown_roles_are_ignored() {
        let fx = fixture().await;
        let project = project_at(&fx, GateId::G1).await;
        fx.executor
            .set_outcome_for_role(
                "requirements-analyst",
                ScriptedOutcome::success("brief written\nhandoff: wizard"),
            )
            .await;

        fx.orchestrator.execute_gate_agents(project.id, GateId::G1).await.unwrap();

        assert!(fx.handoffs.latest_for_role(project.id, "wizard").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn auto_repair_stops_once_the_budget_is_spent() {
        let fx =
            fixture_with(single_role_catalog("backend-developer"), OrchestratorConfig::default())
                .await;
        let project = project_at(&fx, GateId::G1).await;
        fx.executor
            .set_outcome_for_role("backend-developer", ScriptedOutcome::failure("no compile"))
            .await;

        // Budget allows three failed attempts; the fourth failure no longer
        // reaches the self-healing hook, so the validator stays at three
        // fresh-validation runs.
        for _ in 0..4 {
            fx.orchestrator.execute_gate_agents(project.id, GateId::G1).await.unwrap();
        }

        let attempts = fx.attempts.list_for_gate(project.id, GateId::G1).await.unwrap();
        assert_eq!(attempts.len(), 4);
        assert!(attempts.iter().all(|a| a.status == AttemptStatus::Failed));
        assert_eq!(fx.validator.run_count().await, 3);
    }

    #[test]
    fn detect_handoff_ignores_case_and_padding() {
        assert_eq!(
            detect_handoff("notes\n  HANDOFF: qa-engineer  \nmore"),
            Some("qa-engineer".to_string())
        );
        assert_eq!(detect_handoff("handoff:"), None);
        assert_eq!(detect_handoff("no directive here"), None);
    }

    #[test]
    fn proof_summary_compacts_error_lists() {
        assert_eq!(proof_summary(&[]), "clean");
        assert_eq!(proof_summary(&["E1".to_string()]), "E1");
        assert_eq!(
            proof_summary(&["E1".to_string(), "E2".to_string(), "E3".to_string()]),
            "E1 (+2 more)"
        );
    }
}
