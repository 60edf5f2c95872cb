//! Escalation CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::context::CliContext;
use crate::cli::id_resolver::{resolve_escalation_id, resolve_project_id};
use crate::cli::output::{list_table, output, short_id, styled_status, truncate, CommandOutput};
use crate::domain::models::{Escalation, EscalationStatus};
use crate::services::event_bus::EventPayload;

#[derive(Args, Debug)]
pub struct EscalationArgs {
    #[command(subcommand)]
    pub command: EscalationCommands,
}

#[derive(Subcommand, Debug)]
pub enum EscalationCommands {
    /// List a project's escalations
    List {
        /// Project ID (any unique prefix)
        project: String,
        /// Filter by status (pending, resolved)
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Mark an escalation resolved so runs can continue
    Resolve {
        /// Escalation ID (any unique prefix)
        id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct EscalationOutput {
    pub id: String,
    pub severity: String,
    pub role: String,
    pub summary: String,
    pub status: String,
    pub created_at: String,
}

impl From<&Escalation> for EscalationOutput {
    fn from(escalation: &Escalation) -> Self {
        Self {
            id: escalation.id.to_string(),
            severity: escalation.severity.to_string(),
            role: escalation.role.clone(),
            summary: escalation.summary.clone(),
            status: escalation.status.to_string(),
            created_at: escalation.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct EscalationListOutput {
    pub escalations: Vec<EscalationOutput>,
    pub total: usize,
}

impl CommandOutput for EscalationListOutput {
    fn to_human(&self) -> String {
        if self.escalations.is_empty() {
            return "No escalations found.".to_string();
        }

        let mut table = list_table(&["ID", "SEVERITY", "ROLE", "STATUS", "SUMMARY"]);
        for escalation in &self.escalations {
            table.add_row(vec![
                short_id(&escalation.id),
                escalation.severity.clone(),
                escalation.role.clone(),
                styled_status(&escalation.status),
                truncate(&escalation.summary, 48),
            ]);
        }

        format!("Found {} escalation(s):\n{}", self.total, table)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct EscalationActionOutput {
    pub success: bool,
    pub message: String,
    pub escalation: Option<EscalationOutput>,
}

impl CommandOutput for EscalationActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: EscalationArgs, json_mode: bool) -> Result<()> {
    let ctx = CliContext::load().await?;

    match args.command {
        EscalationCommands::List { project, status } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let status = match status {
                Some(s) => Some(
                    EscalationStatus::from_str(&s)
                        .ok_or_else(|| anyhow::anyhow!("Invalid status: {}", s))?,
                ),
                None => None,
            };

            let escalations = ctx.escalations.list_for_project(project_id, status).await?;
            let out = EscalationListOutput {
                total: escalations.len(),
                escalations: escalations.iter().map(EscalationOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        EscalationCommands::Resolve { id } => {
            let escalation_id = resolve_escalation_id(&ctx.pool, &id).await?;
            let mut escalation = ctx
                .escalations
                .get(escalation_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Escalation not found: {}", id))?;

            if escalation.status == EscalationStatus::Resolved {
                let out = EscalationActionOutput {
                    success: true,
                    message: format!("Escalation {} is already resolved.", short_id(escalation_id)),
                    escalation: Some(EscalationOutput::from(&escalation)),
                };
                output(&out, json_mode);
                return Ok(());
            }

            escalation.resolve();
            ctx.escalations.update(&escalation).await?;
            ctx.events.emit(EventPayload::EscalationResolved {
                project_id: escalation.project_id,
                escalation_id: escalation.id,
            });

            let out = EscalationActionOutput {
                success: true,
                message: format!(
                    "Escalation {} resolved. Runs for this project can continue.",
                    short_id(escalation_id)
                ),
                escalation: Some(EscalationOutput::from(&escalation)),
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}
