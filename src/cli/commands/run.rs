//! Pipeline run command: drive a project until it needs a human.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::adapters::agents::{CommandAgentExecutor, MockAgentExecutor};
use crate::adapters::validation::{CommandValidator, MockValidator};
use crate::adapters::workspace::LocalWorkspace;
use crate::application::RunHalt;
use crate::cli::context::{CliContext, WORKSPACE_ROOT};
use crate::cli::id_resolver::resolve_project_id;
use crate::cli::output::{create_spinner, output, short_id, CommandOutput};
use crate::domain::ports::{AgentExecutor, Validator, Workspace};
use crate::services::event_bus::{EventPayload, PipelineEvent};

/// How gate rounds obtain an agent and a validator.
///
/// `--dry-run` swaps in scripted stand-ins so a pipeline can be exercised
/// without spawning anything. Otherwise `--agent-cmd` names the program that
/// plays each role (prompt on stdin, role in `$GATEHOUSE_ROLE`) and the
/// `--*-cmd` flags name the validation stages. Unset stages report clean.
#[derive(Args, Debug, Clone)]
pub struct ExecutorArgs {
    /// Use scripted agents and a passing validator instead of real commands
    #[arg(long)]
    pub dry_run: bool,
    /// Program to run for each agent role
    #[arg(long, conflicts_with = "dry_run")]
    pub agent_cmd: Option<String>,
    /// Extra argument for the agent program (repeatable)
    #[arg(long = "agent-arg", requires = "agent_cmd", allow_hyphen_values = true)]
    pub agent_args: Vec<String>,
    /// Shell command for the build validation stage
    #[arg(long)]
    pub build_cmd: Option<String>,
    /// Shell command for the lint validation stage
    #[arg(long)]
    pub lint_cmd: Option<String>,
    /// Shell command for the test validation stage
    #[arg(long)]
    pub test_cmd: Option<String>,
}

impl ExecutorArgs {
    /// Pick the executor, validator, and workspace for a run.
    pub fn collaborators(
        &self,
    ) -> Result<(Arc<dyn AgentExecutor>, Arc<dyn Validator>, Arc<dyn Workspace>)> {
        let workspace: Arc<dyn Workspace> = Arc::new(LocalWorkspace::new(WORKSPACE_ROOT));

        if self.dry_run {
            return Ok((
                Arc::new(MockAgentExecutor::new()),
                Arc::new(MockValidator::new()),
                workspace,
            ));
        }

        let program = self.agent_cmd.clone().ok_or_else(|| {
            anyhow::anyhow!("No agent command configured. Pass --agent-cmd or --dry-run.")
        })?;
        let executor: Arc<dyn AgentExecutor> =
            Arc::new(CommandAgentExecutor::new(program, self.agent_args.clone()));

        let mut validator = CommandValidator::new(WORKSPACE_ROOT);
        if let Some(cmd) = &self.build_cmd {
            validator = validator.with_build(cmd);
        }
        if let Some(cmd) = &self.lint_cmd {
            validator = validator.with_lint(cmd);
        }
        if let Some(cmd) = &self.test_cmd {
            validator = validator.with_test(cmd);
        }

        Ok((executor, Arc::new(validator), workspace))
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Project ID (any unique prefix)
    pub project: String,
    #[command(flatten)]
    pub executor: ExecutorArgs,
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub project_id: String,
    pub halt: String,
    pub rounds: u32,
    pub hint: Option<String>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Run halted after {} round(s): {}",
            self.rounds, self.halt
        )];
        if let Some(hint) = &self.hint {
            lines.push(hint.clone());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// One line per pipeline event for the live run feed.
fn event_line(event: &PipelineEvent) -> String {
    match &event.payload {
        EventPayload::ProjectCreated { name, category, .. } => {
            format!("project created: {} ({})", name, category)
        }
        EventPayload::ProjectCompleted { .. } => "project complete".to_string(),
        EventPayload::TasksDecomposed { task_count, .. } => {
            format!("{} tasks planned", task_count)
        }
        EventPayload::GateReady { gate_id, .. } => {
            format!("gate {} ready for review", gate_id)
        }
        EventPayload::GateApproved { gate_id, actor, next_gate, .. } => match next_gate {
            Some(next) => format!("gate {} approved by {}, next {}", gate_id, actor, next),
            None => format!("gate {} approved by {}", gate_id, actor),
        },
        EventPayload::GateRejected { gate_id, actor, reason, .. } => {
            format!("gate {} rejected by {}: {}", gate_id, actor, reason)
        }
        EventPayload::GateRoundCompleted { gate_id, completed, failed, .. } => {
            format!("gate {} round: {} completed, {} failed", gate_id, completed, failed)
        }
        EventPayload::GateRoundSkipped { gate_id, reason, .. } => {
            format!("gate {} round skipped: {}", gate_id, reason)
        }
        EventPayload::StuckGateDetected { gate_id, .. } => {
            format!("gate {} is stuck", gate_id)
        }
        EventPayload::AgentStarted { gate_id, role, .. } => {
            format!("[{}] {} started", gate_id, role)
        }
        EventPayload::AgentCompleted { gate_id, role, tokens_used, .. } => {
            format!("[{}] {} completed ({} tokens)", gate_id, role, tokens_used)
        }
        EventPayload::AgentFailed { gate_id, role, error, .. } => {
            format!("[{}] {} failed: {}", gate_id, role, error)
        }
        EventPayload::HandoffRecorded { from_role, to_role, .. } => {
            format!("handoff recorded: {} to {}", from_role, to_role)
        }
        EventPayload::DeliverablesCompleted { gate_id, role, .. } => {
            format!("[{}] deliverables complete for {}", gate_id, role)
        }
        EventPayload::ProofRecorded { gate_id, proof_type, passed, role, .. } => {
            let verdict = if *passed { "passed" } else { "failed" };
            format!("[{}] proof {} {} ({})", gate_id, proof_type, verdict, role)
        }
        EventPayload::RepairStarted { role, error_count, .. } => {
            format!("repair started for {} ({} errors)", role, error_count)
        }
        EventPayload::RepairSucceeded { role, attempt_number, fixed, .. } => {
            format!("repair succeeded for {} on attempt {} ({} fixed)", role, attempt_number, fixed)
        }
        EventPayload::RepairFailed { role, attempts, remaining, .. } => {
            format!(
                "repair failed for {} after {} attempt(s), {} errors remain",
                role, attempts, remaining
            )
        }
        EventPayload::EscalationRaised { escalation_id, severity, role, .. } => {
            format!("escalation {} raised ({}) for {}", short_id(escalation_id), severity, role)
        }
        EventPayload::EscalationResolved { escalation_id, .. } => {
            format!("escalation {} resolved", short_id(escalation_id))
        }
    }
}

/// Advice to print under the halt line, when there is a next move.
fn halt_hint(halt: &RunHalt, project_id: &str) -> Option<String> {
    match halt {
        RunHalt::Complete => None,
        RunHalt::AwaitingReview(gate) => Some(format!(
            "Approve with: gatehouse gate approve {} {}",
            project_id, gate
        )),
        RunHalt::Rejected(gate) => Some(format!(
            "Gate {} was rejected; inspect with: gatehouse gate status {} {}",
            gate, project_id, gate
        )),
        RunHalt::Blocked(gate) => Some(format!(
            "Gate {} is blocked; inspect with: gatehouse gate status {} {}",
            gate, project_id, gate
        )),
        RunHalt::Escalated(id) => Some(format!(
            "Resolve first: gatehouse escalation resolve {}",
            short_id(id)
        )),
        RunHalt::Stalled(_) => Some(format!(
            "Inspect with: gatehouse gate status {}",
            project_id
        )),
    }
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let ctx = CliContext::load().await?;
    let project_id = resolve_project_id(&ctx.pool, &args.project).await?;

    let (executor, validator, workspace) = args.executor.collaborators()?;
    let orchestrator = ctx.orchestrator(executor, validator, workspace);
    let runner = ctx.runner(orchestrator);

    // Subscribe before advancing so no event is missed, and print the feed
    // through the spinner to keep redraws clean.
    let summary = if json_mode {
        runner.advance(project_id).await?
    } else {
        let spinner = create_spinner("Running pipeline...");
        let mut events = ctx.events.subscribe();
        let feed = {
            let spinner = spinner.clone();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    spinner.println(event_line(&event));
                }
            })
        };

        let result = runner.advance(project_id).await;
        feed.abort();
        spinner.finish_and_clear();
        result?
    };

    let short = short_id(project_id);
    let out = RunOutput {
        project_id: project_id.to_string(),
        halt: summary.halt.to_string(),
        rounds: summary.rounds,
        hint: halt_hint(&summary.halt, &short),
    };
    output(&out, json_mode);

    Ok(())
}
