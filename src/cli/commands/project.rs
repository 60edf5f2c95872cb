//! Project CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::context::CliContext;
use crate::cli::id_resolver::resolve_project_id;
use crate::cli::output::{list_table, output, short_id, styled_status, truncate, CommandOutput};
use crate::domain::models::{EscalationStatus, Project, ProjectCategory, TaskStatus};
use crate::services::event_bus::EventPayload;

#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommands,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project and initialize its gate plan
    Create {
        /// Project name
        name: String,
        /// Category (standard, ml-augmented, hybrid, enhancement)
        #[arg(short, long, default_value = "standard")]
        category: String,
        /// Approving owner recorded on the project
        #[arg(short, long, env = "USER", default_value = "operator")]
        owner: String,
    },
    /// Show project details, gates, and progress
    Show {
        /// Project ID (any unique prefix)
        id: String,
    },
    /// List projects
    List,
}

#[derive(Debug, serde::Serialize)]
pub struct ProjectOutput {
    pub id: String,
    pub name: String,
    pub category: String,
    pub owner: String,
    pub current_gate: String,
    pub current_phase: String,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<&Project> for ProjectOutput {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.to_string(),
            name: project.name.clone(),
            category: project.category.to_string(),
            owner: project.owner.clone(),
            current_gate: project.current_gate.to_string(),
            current_phase: project.current_phase.clone(),
            created_at: project.created_at.to_rfc3339(),
            completed_at: project.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ProjectActionOutput {
    pub success: bool,
    pub message: String,
    pub project: Option<ProjectOutput>,
}

impl CommandOutput for ProjectActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ProjectListOutput {
    pub projects: Vec<ProjectOutput>,
    pub total: usize,
}

impl CommandOutput for ProjectListOutput {
    fn to_human(&self) -> String {
        if self.projects.is_empty() {
            return "No projects found.".to_string();
        }

        let mut table = list_table(&["ID", "NAME", "CATEGORY", "GATE", "PHASE", "OWNER"]);
        for project in &self.projects {
            table.add_row(vec![
                short_id(&project.id),
                truncate(&project.name, 24),
                project.category.clone(),
                project.current_gate.clone(),
                project.current_phase.clone(),
                project.owner.clone(),
            ]);
        }

        format!("Found {} project(s):\n{}", self.total, table)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct GateRow {
    pub gate: String,
    pub name: String,
    pub status: String,
    pub approved_by: Option<String>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct ProjectDetailOutput {
    pub project: ProjectOutput,
    pub gates: Vec<GateRow>,
    pub tasks_total: usize,
    pub tasks_complete: usize,
    pub pending_escalations: usize,
}

impl CommandOutput for ProjectDetailOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Project: {}", self.project.name),
            format!("ID: {}", self.project.id),
            format!("Category: {}", self.project.category),
            format!("Owner: {}", self.project.owner),
            format!(
                "Gate: {} ({})",
                self.project.current_gate, self.project.current_phase
            ),
            format!("Created: {}", self.project.created_at),
        ];

        if let Some(completed) = &self.project.completed_at {
            lines.push(format!("Completed: {}", completed));
        }

        if !self.gates.is_empty() {
            let mut table = list_table(&["GATE", "NAME", "STATUS", "APPROVED BY"]);
            for row in &self.gates {
                table.add_row(vec![
                    row.gate.clone(),
                    row.name.clone(),
                    styled_status(&row.status),
                    row.approved_by.clone().unwrap_or_default(),
                ]);
            }
            lines.push(format!("\nGates:\n{}", table));
        }

        for row in &self.gates {
            if let Some(reason) = &row.rejection_reason {
                lines.push(format!("{} rejected: {}", row.gate, reason));
            }
        }

        lines.push(format!(
            "\nTasks: {}/{} complete",
            self.tasks_complete, self.tasks_total
        ));
        if self.pending_escalations > 0 {
            lines.push(format!("Pending escalations: {}", self.pending_escalations));
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ProjectArgs, json_mode: bool) -> Result<()> {
    let ctx = CliContext::load().await?;

    match args.command {
        ProjectCommands::Create { name, category, owner } => {
            let category = ProjectCategory::from_str(&category)
                .ok_or_else(|| anyhow::anyhow!("Invalid category: {}", category))?;
            let first_gate = ctx
                .catalog
                .first_gate(category)
                .ok_or_else(|| anyhow::anyhow!("No gates configured for category: {}", category))?;
            let first_phase = ctx
                .catalog
                .spec(category, first_gate)
                .map_or_else(|| "intake".to_string(), |spec| spec.phase.clone());

            let project = Project::new(name, category, owner, first_gate, first_phase);
            project.validate().map_err(|reason| anyhow::anyhow!(reason))?;
            ctx.projects.insert(&project).await?;

            let first = ctx.state_machine.initialize_gates(&project).await?;
            let decomposition = ctx.decomposer.decompose(&project).await?;

            ctx.events.emit(EventPayload::ProjectCreated {
                project_id: project.id,
                name: project.name.clone(),
                category: project.category.to_string(),
            });

            let out = ProjectActionOutput {
                success: true,
                message: format!(
                    "Project created: {} ({} tasks, first gate {})",
                    project.id,
                    decomposition.tasks.len(),
                    first.gate_id,
                ),
                project: Some(ProjectOutput::from(&project)),
            };
            output(&out, json_mode);
        }

        ProjectCommands::Show { id } => {
            let project_id = resolve_project_id(&ctx.pool, &id).await?;
            let project = ctx
                .projects
                .get(project_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Project not found: {}", id))?;

            let sequence = ctx.catalog.sequence(project.category);
            let mut gates = ctx.gates.list_for_project(project.id).await?;
            gates.sort_by_key(|gate| {
                sequence
                    .iter()
                    .position(|id| *id == gate.gate_id)
                    .unwrap_or(usize::MAX)
            });

            let rows = gates
                .iter()
                .map(|gate| GateRow {
                    gate: gate.gate_id.to_string(),
                    name: ctx
                        .catalog
                        .spec(project.category, gate.gate_id)
                        .map(|spec| spec.name.clone())
                        .unwrap_or_default(),
                    status: gate.status.to_string(),
                    approved_by: gate.approved_by.clone(),
                    rejection_reason: gate.rejection_reason.clone(),
                })
                .collect();

            let tasks = ctx.tasks.list_for_project(project.id).await?;
            let tasks_complete = tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Complete)
                .count();
            let pending = ctx
                .escalations
                .list_for_project(project.id, Some(EscalationStatus::Pending))
                .await?;

            let out = ProjectDetailOutput {
                project: ProjectOutput::from(&project),
                gates: rows,
                tasks_total: tasks.len(),
                tasks_complete,
                pending_escalations: pending.len(),
            };
            output(&out, json_mode);
        }

        ProjectCommands::List => {
            let projects = ctx.projects.list().await?;
            let out = ProjectListOutput {
                total: projects.len(),
                projects: projects.iter().map(ProjectOutput::from).collect(),
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}
