//! Bounded self-healing retry loop.
//!
//! When validation fails, the loop feeds the current error list back to the
//! responsible role, writes whatever files the agent produces, re-validates,
//! and repeats until clean or out of budget. Budget exhaustion is a result,
//! not an error; it becomes an Escalation for a human. This service is the
//! only producer of Escalation records.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentAttempt, Escalation, EscalationSeverity, GateCatalog, GateId, Handoff, Project,
    SelfHealConfig,
};
use crate::domain::ports::{
    AgentExecutor, AttemptRepository, EscalationRepository, HandoffRepository,
    ProjectRepository, Validator, Workspace,
};
use crate::services::event_bus::{EventBus, EventPayload};

/// Final state of one repair loop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
    /// True when validation reported zero errors before the budget ran out.
    pub success: bool,
    /// Iterations actually used. Zero means the input error list was
    /// already empty and no agent was invoked.
    pub attempt_number: u32,
    /// Errors from the input list that disappeared along the way.
    pub fixed_errors: Vec<String>,
    /// Errors still reported by the last validation run.
    pub remaining_errors: Vec<String>,
}

/// Iterative error-feedback repair with an escalation fallback.
pub struct SelfHealingService {
    projects: Arc<dyn ProjectRepository>,
    attempts: Arc<dyn AttemptRepository>,
    handoffs: Arc<dyn HandoffRepository>,
    escalations: Arc<dyn EscalationRepository>,
    executor: Arc<dyn AgentExecutor>,
    workspace: Arc<dyn Workspace>,
    validator: Arc<dyn Validator>,
    catalog: Arc<GateCatalog>,
    events: Arc<EventBus>,
    config: SelfHealConfig,
}

impl SelfHealingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        attempts: Arc<dyn AttemptRepository>,
        handoffs: Arc<dyn HandoffRepository>,
        escalations: Arc<dyn EscalationRepository>,
        executor: Arc<dyn AgentExecutor>,
        workspace: Arc<dyn Workspace>,
        validator: Arc<dyn Validator>,
        catalog: Arc<GateCatalog>,
        events: Arc<EventBus>,
        config: SelfHealConfig,
    ) -> Self {
        Self {
            projects,
            attempts,
            handoffs,
            escalations,
            executor,
            workspace,
            validator,
            catalog,
            events,
            config,
        }
    }

    /// Run up to `max_attempts` repair iterations against the current error
    /// list.
    ///
    /// Each iteration prompts with the errors still outstanding, never the
    /// original list, so fixed errors are not re-reported. Iteration
    /// failures (executor or collaborator errors) become FAILED attempt
    /// records and the loop moves on. Returns early the moment validation
    /// comes back clean.
    pub async fn retry_with_errors(
        &self,
        project: &Project,
        role: &str,
        unresolved_errors: Vec<String>,
        max_attempts: u32,
    ) -> DomainResult<RetryOutcome> {
        let mut remaining = unresolved_errors;
        let mut fixed: Vec<String> = Vec::new();

        if remaining.is_empty() {
            return Ok(RetryOutcome {
                success: true,
                attempt_number: 0,
                fixed_errors: fixed,
                remaining_errors: remaining,
            });
        }

        tracing::info!(
            project_id = %project.id,
            role = %role,
            errors = remaining.len(),
            max_attempts,
            "self-healing started"
        );
        self.events.emit(EventPayload::RepairStarted {
            project_id: project.id,
            role: role.to_string(),
            error_count: remaining.len(),
        });

        let mut attempt_number = 0;
        while attempt_number < max_attempts {
            attempt_number += 1;
            match self
                .repair_iteration(project, role, &remaining, attempt_number, max_attempts)
                .await
            {
                Ok(new_errors) => {
                    let fixed_now = remaining
                        .iter()
                        .filter(|error| !new_errors.contains(error))
                        .cloned();
                    fixed.extend(fixed_now);
                    remaining = new_errors;
                    tracing::debug!(
                        project_id = %project.id,
                        role = %role,
                        attempt_number,
                        remaining = remaining.len(),
                        "repair iteration validated"
                    );
                    if remaining.is_empty() {
                        tracing::info!(
                            project_id = %project.id,
                            role = %role,
                            attempt_number,
                            fixed = fixed.len(),
                            "self-healing succeeded"
                        );
                        self.events.emit(EventPayload::RepairSucceeded {
                            project_id: project.id,
                            role: role.to_string(),
                            attempt_number,
                            fixed: fixed.len(),
                        });
                        return Ok(RetryOutcome {
                            success: true,
                            attempt_number,
                            fixed_errors: fixed,
                            remaining_errors: remaining,
                        });
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        project_id = %project.id,
                        role = %role,
                        attempt_number,
                        error = %err,
                        "repair iteration failed"
                    );
                }
            }
        }

        tracing::warn!(
            project_id = %project.id,
            role = %role,
            attempts = attempt_number,
            remaining = remaining.len(),
            "self-healing budget exhausted"
        );
        self.events.emit(EventPayload::RepairFailed {
            project_id: project.id,
            role: role.to_string(),
            attempts: attempt_number,
            remaining: remaining.len(),
        });
        Ok(RetryOutcome {
            success: false,
            attempt_number,
            fixed_errors: fixed,
            remaining_errors: remaining,
        })
    }

    /// One prompt-write-validate cycle. Any failure marks the attempt
    /// FAILED and surfaces as `Err` for the loop to swallow.
    async fn repair_iteration(
        &self,
        project: &Project,
        role: &str,
        remaining: &[String],
        attempt_number: u32,
        max_attempts: u32,
    ) -> DomainResult<Vec<String>> {
        let mut attempt = AgentAttempt::start(
            project.id,
            project.current_gate,
            role,
            format!("repair iteration {attempt_number}: {} error(s)", remaining.len()),
        );
        self.attempts.insert(&attempt).await?;

        let context = format!(
            "You are the {role} for project '{}'. Fix the reported validation errors \
             without regressing working behavior. Return changed files as fenced code \
             blocks annotated with path=.",
            project.name
        );
        let prompt = repair_prompt(remaining, attempt_number, max_attempts);

        let result = self.execute_and_validate(project, role, &context, &prompt).await;
        match result {
            Ok((output, input_tokens, output_tokens, errors)) => {
                attempt.complete(output, input_tokens, output_tokens);
                self.attempts.update(&attempt).await?;
                Ok(errors)
            }
            Err(err) => {
                attempt.fail(err.to_string());
                self.attempts.update(&attempt).await?;
                Err(err)
            }
        }
    }

    /// Executor call, file writes, and re-validation for one iteration.
    async fn execute_and_validate(
        &self,
        project: &Project,
        role: &str,
        context: &str,
        prompt: &str,
    ) -> DomainResult<(String, u64, u64, Vec<String>)> {
        let outcome = self.executor.execute(role, context, prompt).await?;
        if !outcome.success {
            let error = outcome.error.unwrap_or_else(|| "agent gave up".to_string());
            return Err(DomainError::ExecutionFailed(error));
        }

        let patches = self.workspace.extract_files(&outcome.content);
        for patch in &patches {
            self.workspace.write_file(project.id, &patch.path, &patch.content).await?;
        }
        tracing::debug!(
            project_id = %project.id,
            role = %role,
            files = patches.len(),
            "repair files written"
        );

        let report = self.validator.run_full_validation(project.id).await?;
        Ok((outcome.content, outcome.input_tokens, outcome.output_tokens, report.all_errors()))
    }

    /// Gatekeeper for automatic repair of a failed attempt.
    ///
    /// Only roles on the configured allow-list may self-heal. The current
    /// error list comes from a fresh validation run, not from the stale
    /// attempt. Success hands off to the next expected role; exhaustion
    /// raises a high-severity Escalation quoting the top remaining errors.
    pub async fn auto_retry_on_build_failure(
        &self,
        project_id: Uuid,
        attempt_id: Uuid,
        actor: &str,
    ) -> DomainResult<bool> {
        let attempt = self
            .attempts
            .get(attempt_id)
            .await?
            .ok_or(DomainError::AttemptNotFound(attempt_id))?;
        let project = self
            .projects
            .get(project_id)
            .await?
            .ok_or(DomainError::ProjectNotFound(project_id))?;
        let role = attempt.role.clone();

        if !self.config.allowed_roles.iter().any(|allowed| allowed == &role) {
            tracing::info!(
                project_id = %project_id,
                role = %role,
                "role is not on the self-heal allow-list"
            );
            return Ok(false);
        }

        let report = self.validator.run_full_validation(project_id).await?;
        let errors = report.all_errors();
        tracing::info!(
            project_id = %project_id,
            role = %role,
            actor = %actor,
            errors = errors.len(),
            "auto-retry triggered"
        );

        let outcome = self
            .retry_with_errors(&project, &role, errors, self.config.max_attempts)
            .await?;

        if outcome.success {
            // A zero-iteration success means there was nothing to repair;
            // no handoff is owed for that.
            if outcome.attempt_number > 0 {
                self.record_repair_handoff(&project, attempt.gate_id, &role, &outcome)
                    .await?;
            }
            return Ok(true);
        }

        let escalation = self.raise_escalation(project_id, &role, &outcome).await?;
        tracing::error!(
            project_id = %project_id,
            role = %role,
            escalation_id = %escalation.id,
            "self-healing exhausted; escalated"
        );
        Ok(false)
    }

    async fn record_repair_handoff(
        &self,
        project: &Project,
        gate_id: GateId,
        role: &str,
        outcome: &RetryOutcome,
    ) -> DomainResult<()> {
        let Some(to_role) = self.catalog.successor_role(project.category, gate_id, role)
        else {
            return Ok(());
        };
        let deliverables = self
            .catalog
            .spec(project.category, gate_id)
            .map(|spec| {
                spec.deliverables
                    .iter()
                    .filter(|d| d.role == role)
                    .map(|d| d.name.clone())
                    .collect()
            })
            .unwrap_or_default();
        let handoff = Handoff::new(project.id, role, to_role.clone(), project.current_phase.clone())
            .with_deliverables(deliverables)
            .with_notes(format!(
                "validation repaired after {} iteration(s)",
                outcome.attempt_number
            ));
        self.handoffs.insert(&handoff).await?;
        self.events.emit(EventPayload::HandoffRecorded {
            project_id: project.id,
            from_role: role.to_string(),
            to_role,
        });
        Ok(())
    }

    async fn raise_escalation(
        &self,
        project_id: Uuid,
        role: &str,
        outcome: &RetryOutcome,
    ) -> DomainResult<Escalation> {
        let mut summary = format!(
            "self-healing for '{role}' exhausted {} attempt(s); {} error(s) unresolved",
            outcome.attempt_number,
            outcome.remaining_errors.len()
        );
        for error in outcome
            .remaining_errors
            .iter()
            .take(self.config.escalation_error_limit)
        {
            summary.push_str("\n- ");
            summary.push_str(error);
        }
        let escalation =
            Escalation::new(project_id, EscalationSeverity::High, role, summary);
        self.escalations.insert(&escalation).await?;
        self.events.emit(EventPayload::EscalationRaised {
            project_id,
            escalation_id: escalation.id,
            severity: escalation.severity,
            role: role.to_string(),
        });
        Ok(escalation)
    }
}

/// Error-feedback instruction for one iteration, built from the errors
/// still outstanding.
fn repair_prompt(remaining: &[String], attempt_number: u32, max_attempts: u32) -> String {
    let mut prompt = format!(
        "Validation failed. Fix the following {} error(s) (repair attempt \
         {attempt_number} of {max_attempts}):\n",
        remaining.len()
    );
    for error in remaining {
        prompt.push_str("- ");
        prompt.push_str(error);
        prompt.push('\n');
    }
    prompt
}
