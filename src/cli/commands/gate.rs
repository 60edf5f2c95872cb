//! Gate CLI commands: inspect, approve, reject, run, attest, recover.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::adapters::agents::MockAgentExecutor;
use crate::adapters::validation::MockValidator;
use crate::adapters::workspace::LocalWorkspace;
use crate::cli::commands::run::ExecutorArgs;
use crate::cli::context::{CliContext, WORKSPACE_ROOT};
use crate::cli::id_resolver::resolve_project_id;
use crate::cli::output::{
    list_table, output, short_id, styled_status, truncate, CommandOutput,
};
use crate::domain::models::{GateId, ProofType};
use crate::services::gate_orchestrator::{GateCheck, GateRound};

#[derive(Args, Debug)]
pub struct GateArgs {
    #[command(subcommand)]
    pub command: GateCommands,
}

#[derive(Subcommand, Debug)]
pub enum GateCommands {
    /// Show a gate's readiness: deliverables, proofs, and attempts
    Status {
        /// Project ID (any unique prefix)
        project: String,
        /// Gate (G1..G9); defaults to the project's current gate
        gate: Option<String>,
    },
    /// Approve a gate and advance the pipeline pointer
    Approve {
        /// Project ID (any unique prefix)
        project: String,
        /// Gate to approve (G1..G9)
        gate: String,
        /// Approving identity
        #[arg(short, long, env = "USER", default_value = "operator")]
        actor: String,
        /// Approval token (approved, approve, yes, accept)
        #[arg(short, long, default_value = "approved")]
        token: String,
        /// Notes recorded on the approval
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Reject a gate with a reason; remediation is external
    Reject {
        /// Project ID (any unique prefix)
        project: String,
        /// Gate to reject (G1..G9)
        gate: String,
        /// Rejecting identity
        #[arg(short, long, env = "USER", default_value = "operator")]
        actor: String,
        /// Why the gate was rejected
        #[arg(short, long)]
        reason: String,
    },
    /// Run one agent round for a gate and re-check its readiness
    Run {
        /// Project ID (any unique prefix)
        project: String,
        /// Gate to run (G1..G9)
        gate: String,
        #[command(flatten)]
        executor: ExecutorArgs,
    },
    /// Re-run a pending gate's agents after failures
    Retry {
        /// Project ID (any unique prefix)
        project: String,
        /// Gate to retry (G1..G9)
        gate: String,
        /// Identity requesting the retry
        #[arg(short, long, env = "USER", default_value = "operator")]
        actor: String,
        #[command(flatten)]
        executor: ExecutorArgs,
    },
    /// Record an externally produced proof artifact for a gate
    Attest {
        /// Project ID (any unique prefix)
        project: String,
        /// Gate the proof belongs to (G1..G9)
        gate: String,
        /// Proof type (build, lint, test, security_scan, runtime)
        #[arg(long)]
        proof_type: String,
        /// Record the proof as failed instead of passed
        #[arg(long)]
        failed: bool,
        /// One-line description of the evidence
        #[arg(short, long)]
        summary: String,
        /// Role credited with the proof
        #[arg(short, long, default_value = "external")]
        role: String,
    },
    /// Reconcile the project pointer and gate records after a partial approval
    Recover {
        /// Project ID (any unique prefix)
        project: String,
    },
}

fn parse_gate(s: &str) -> Result<GateId> {
    GateId::from_str(&s.to_uppercase())
        .ok_or_else(|| anyhow::anyhow!("Invalid gate: {} (expected G1..G9)", s))
}

#[derive(Debug, serde::Serialize)]
pub struct DeliverableRow {
    pub name: String,
    pub role: String,
    pub status: String,
}

#[derive(Debug, serde::Serialize)]
pub struct ProofRow {
    pub proof_type: String,
    pub passed: bool,
    pub role: String,
    pub summary: String,
}

#[derive(Debug, serde::Serialize)]
pub struct AttemptRow {
    pub id: String,
    pub role: String,
    pub status: String,
    pub error: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct GateStatusOutput {
    pub project_id: String,
    pub gate: String,
    pub name: String,
    pub status: String,
    pub deliverables: Vec<DeliverableRow>,
    pub proofs: Vec<ProofRow>,
    pub attempts: Vec<AttemptRow>,
    pub deliverables_ok: bool,
    pub proofs_ok: bool,
    pub missing: Vec<String>,
    pub stuck: bool,
}

impl CommandOutput for GateStatusOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Gate {} ({}): {}",
            self.gate,
            self.name,
            styled_status(&self.status)
        )];

        if !self.deliverables.is_empty() {
            let mut table = list_table(&["DELIVERABLE", "ROLE", "STATUS"]);
            for row in &self.deliverables {
                table.add_row(vec![
                    row.name.clone(),
                    row.role.clone(),
                    styled_status(&row.status),
                ]);
            }
            lines.push(format!("\nDeliverables:\n{}", table));
        }

        if !self.proofs.is_empty() {
            let mut table = list_table(&["PROOF", "RESULT", "ROLE", "SUMMARY"]);
            for row in &self.proofs {
                let verdict = if row.passed { "passed" } else { "failed" };
                table.add_row(vec![
                    row.proof_type.clone(),
                    styled_status(verdict),
                    row.role.clone(),
                    truncate(&row.summary, 40),
                ]);
            }
            lines.push(format!("\nProofs:\n{}", table));
        }

        if !self.attempts.is_empty() {
            let mut table = list_table(&["ATTEMPT", "ROLE", "STATUS", "ERROR"]);
            for row in &self.attempts {
                table.add_row(vec![
                    row.id.clone(),
                    row.role.clone(),
                    styled_status(&row.status),
                    truncate(row.error.as_deref().unwrap_or_default(), 40),
                ]);
            }
            lines.push(format!("\nAttempts:\n{}", table));
        }

        if self.deliverables_ok && self.proofs_ok {
            lines.push("\nReady for approval.".to_string());
        } else {
            lines.push(format!("\nNot ready: missing {}", self.missing.join(", ")));
        }

        if self.stuck {
            lines.push(format!(
                "Gate is stuck (failed attempts, nothing running). Retry with: gatehouse gate retry {} {}",
                short_id(&self.project_id),
                self.gate
            ));
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct GateActionOutput {
    pub success: bool,
    pub message: String,
    pub gate: String,
    pub status: String,
}

impl CommandOutput for GateActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct OutcomeRow {
    pub role: String,
    pub status: String,
    pub attempt_id: String,
    pub error: Option<String>,
    pub repaired: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct CheckOutput {
    pub status: String,
    pub transitioned: bool,
    pub deliverables_ok: bool,
    pub proofs_ok: bool,
    pub missing: Vec<String>,
    pub repair_candidate: bool,
}

impl From<&GateCheck> for CheckOutput {
    fn from(check: &GateCheck) -> Self {
        Self {
            status: check.status.to_string(),
            transitioned: check.transitioned,
            deliverables_ok: check.deliverables_ok,
            proofs_ok: check.proofs_ok,
            missing: check.missing.clone(),
            repair_candidate: check.repair_candidate,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct GateRoundOutput {
    pub gate: String,
    pub completed: usize,
    pub failed: usize,
    pub skipped: Option<String>,
    pub outcomes: Vec<OutcomeRow>,
    pub check: CheckOutput,
}

impl GateRoundOutput {
    fn new(round: &GateRound, check: &GateCheck) -> Self {
        Self {
            gate: round.gate_id.to_string(),
            completed: round.completed(),
            failed: round.failed(),
            skipped: round.skipped.clone(),
            outcomes: round
                .outcomes
                .iter()
                .map(|o| OutcomeRow {
                    role: o.role.clone(),
                    status: o.status.to_string(),
                    attempt_id: o.attempt_id.to_string(),
                    error: o.error.clone(),
                    repaired: o.repaired,
                })
                .collect(),
            check: CheckOutput::from(check),
        }
    }
}

impl CommandOutput for GateRoundOutput {
    fn to_human(&self) -> String {
        if let Some(reason) = &self.skipped {
            return format!("Gate {} round skipped: {}", self.gate, reason);
        }

        let mut lines = vec![format!(
            "Gate {} round: {} completed, {} failed",
            self.gate, self.completed, self.failed
        )];

        for outcome in &self.outcomes {
            let mut line = format!(
                "  {} {} ({})",
                outcome.role,
                styled_status(&outcome.status),
                short_id(&outcome.attempt_id)
            );
            if outcome.repaired {
                line.push_str(" [repaired]");
            }
            if let Some(error) = &outcome.error {
                line.push_str(&format!(": {}", truncate(error, 60)));
            }
            lines.push(line);
        }

        if self.check.transitioned {
            lines.push(format!("Gate {} is ready and moved to review.", self.gate));
        } else if self.check.status == "pending" {
            if self.check.missing.is_empty() {
                lines.push(format!("Gate {} stays pending.", self.gate));
            } else {
                lines.push(format!(
                    "Gate {} stays pending, missing: {}",
                    self.gate,
                    self.check.missing.join(", ")
                ));
            }
            if self.check.repair_candidate {
                lines.push("A failed proof has no newer pass; a repair run may clear it.".to_string());
            }
        } else {
            lines.push(format!("Gate {} is {}.", self.gate, self.check.status));
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RecoverOutput {
    pub repaired: bool,
    pub frontier: String,
    pub created_gate: bool,
    pub moved_pointer: bool,
}

impl CommandOutput for RecoverOutput {
    fn to_human(&self) -> String {
        if !self.repaired {
            return format!("Nothing to repair. Frontier gate is {}.", self.frontier);
        }
        let mut actions = Vec::new();
        if self.created_gate {
            actions.push("created the missing gate record");
        }
        if self.moved_pointer {
            actions.push("moved the project pointer");
        }
        format!("Recovered to {}: {}.", self.frontier, actions.join(", "))
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: GateArgs, json_mode: bool) -> Result<()> {
    let ctx = CliContext::load().await?;

    match args.command {
        GateCommands::Status { project, gate } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let project = ctx
                .projects
                .get(project_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Project not found: {}", project))?;
            let gate_id = match gate {
                Some(g) => parse_gate(&g)?,
                None => project.current_gate,
            };

            let gate = ctx
                .gates
                .get(project_id, gate_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Gate {} not found for this project", gate_id))?;

            let deliverables = ctx.deliverables.list_for_gate(project_id, gate_id).await?;
            let proofs = ctx.proofs.list_for_gate(project_id, gate_id).await?;
            let attempts = ctx.attempts.list_for_gate(project_id, gate_id).await?;

            let missing_deliverables =
                ctx.tracker.incomplete_deliverables(project_id, gate_id).await?;
            let proof_check =
                ctx.tracker.proof_requirements_satisfied(project.category, gate_id, &proofs)?;
            let mut missing = missing_deliverables.clone();
            missing.extend(proof_check.missing_types.iter().cloned());

            // The stuck scan lives on the orchestrator; status never runs
            // agents, so scripted collaborators are enough here.
            let orchestrator = ctx.orchestrator(
                Arc::new(MockAgentExecutor::new()),
                Arc::new(MockValidator::new()),
                Arc::new(LocalWorkspace::new(WORKSPACE_ROOT)),
            );
            let stuck = orchestrator.detect_stuck_gate(project_id).await? == Some(gate_id);

            let out = GateStatusOutput {
                project_id: project_id.to_string(),
                gate: gate_id.to_string(),
                name: ctx
                    .catalog
                    .spec(project.category, gate_id)
                    .map(|spec| spec.name.clone())
                    .unwrap_or_default(),
                status: gate.status.to_string(),
                deliverables: deliverables
                    .iter()
                    .map(|d| DeliverableRow {
                        name: d.name.clone(),
                        role: d.role.clone(),
                        status: d.status.to_string(),
                    })
                    .collect(),
                proofs: proofs
                    .iter()
                    .map(|p| ProofRow {
                        proof_type: p.proof_type.to_string(),
                        passed: p.passed,
                        role: p.role.clone(),
                        summary: p.summary.clone(),
                    })
                    .collect(),
                attempts: attempts
                    .iter()
                    .map(|a| AttemptRow {
                        id: short_id(a.id),
                        role: a.role.clone(),
                        status: a.status.to_string(),
                        error: a.error.clone(),
                    })
                    .collect(),
                deliverables_ok: missing_deliverables.is_empty(),
                proofs_ok: proof_check.ok,
                missing,
                stuck,
            };
            output(&out, json_mode);
        }

        GateCommands::Approve { project, gate, actor, token, notes } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let gate_id = parse_gate(&gate)?;

            let approved = ctx
                .state_machine
                .approve(project_id, gate_id, &actor, &token, notes)
                .await?;
            let project = ctx
                .projects
                .get(project_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Project not found: {}", project))?;

            let message = if project.is_complete() {
                format!("Gate {} approved by {}. Pipeline complete.", gate_id, actor)
            } else {
                format!(
                    "Gate {} approved by {}. Pipeline now at {} ({}).",
                    gate_id, actor, project.current_gate, project.current_phase
                )
            };
            let out = GateActionOutput {
                success: true,
                message,
                gate: gate_id.to_string(),
                status: approved.status.to_string(),
            };
            output(&out, json_mode);
        }

        GateCommands::Reject { project, gate, actor, reason } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let gate_id = parse_gate(&gate)?;

            let rejected = ctx
                .state_machine
                .reject(project_id, gate_id, &actor, &reason)
                .await?;
            let out = GateActionOutput {
                success: true,
                message: format!(
                    "Gate {} rejected by {}: {}. Remediation happens outside the pipeline.",
                    gate_id, actor, reason
                ),
                gate: gate_id.to_string(),
                status: rejected.status.to_string(),
            };
            output(&out, json_mode);
        }

        GateCommands::Run { project, gate, executor } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let gate_id = parse_gate(&gate)?;

            let (agents, validator, workspace) = executor.collaborators()?;
            let orchestrator = ctx.orchestrator(agents, validator, workspace);

            let round = orchestrator.execute_gate_agents(project_id, gate_id).await?;
            let check = orchestrator.check_and_transition_gate(project_id, gate_id).await?;
            output(&GateRoundOutput::new(&round, &check), json_mode);
        }

        GateCommands::Retry { project, gate, actor, executor } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let gate_id = parse_gate(&gate)?;

            let (agents, validator, workspace) = executor.collaborators()?;
            let orchestrator = ctx.orchestrator(agents, validator, workspace);

            let round = orchestrator.retry_gate_agents(project_id, gate_id, &actor).await?;
            let check = orchestrator.check_and_transition_gate(project_id, gate_id).await?;
            output(&GateRoundOutput::new(&round, &check), json_mode);
        }

        GateCommands::Attest { project, gate, proof_type, failed, summary, role } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let gate_id = parse_gate(&gate)?;
            let proof_type = ProofType::from_str(&proof_type).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid proof type: {} (expected build, lint, test, security_scan, or runtime)",
                    proof_type
                )
            })?;

            let artifact = ctx
                .tracker
                .record_proof(project_id, gate_id, proof_type, !failed, summary, role)
                .await?;
            let verdict = if artifact.passed { "passed" } else { "failed" };
            let out = GateActionOutput {
                success: true,
                message: format!(
                    "Recorded {} proof ({}) for gate {} from {}.",
                    artifact.proof_type, verdict, gate_id, artifact.role
                ),
                gate: gate_id.to_string(),
                status: verdict.to_string(),
            };
            output(&out, json_mode);
        }

        GateCommands::Recover { project } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let report = ctx.state_machine.recover(project_id).await?;
            let out = RecoverOutput {
                repaired: report.repaired(),
                frontier: report.frontier.to_string(),
                created_gate: report.created_gate,
                moved_pointer: report.moved_pointer,
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}
