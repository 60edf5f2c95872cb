//! Task CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::context::CliContext;
use crate::cli::id_resolver::resolve_project_id;
use crate::cli::output::{list_table, output, short_id, styled_status, truncate, CommandOutput};
use crate::domain::models::Task;

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List a project's tasks in decomposition order
    List {
        /// Project ID (any unique prefix)
        project: String,
    },
    /// Show the next task whose dependency is satisfied
    Next {
        /// Project ID (any unique prefix)
        project: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct TaskOutput {
    pub id: String,
    pub position: u32,
    pub description: String,
    pub role: String,
    pub status: String,
    pub parent_id: Option<String>,
}

impl From<&Task> for TaskOutput {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            position: task.position,
            description: task.description.clone(),
            role: task.role.clone(),
            status: task.status.to_string(),
            parent_id: task.parent_id.map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<TaskOutput>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found. Has the project been created?".to_string();
        }

        let mut table = list_table(&["#", "ID", "DESCRIPTION", "ROLE", "STATUS"]);
        for task in &self.tasks {
            table.add_row(vec![
                task.position.to_string(),
                short_id(&task.id),
                truncate(&task.description, 48),
                task.role.clone(),
                styled_status(&task.status),
            ]);
        }

        format!("Found {} task(s):\n{}", self.total, table)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct NextTaskOutput {
    pub task: Option<TaskOutput>,
}

impl CommandOutput for NextTaskOutput {
    fn to_human(&self) -> String {
        match &self.task {
            Some(task) => format!(
                "Next: [{}] {} (task {})",
                task.role,
                task.description,
                short_id(&task.id)
            ),
            None => {
                "No executable task. Everything is done or blocked on a dependency.".to_string()
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: TaskArgs, json_mode: bool) -> Result<()> {
    let ctx = CliContext::load().await?;

    match args.command {
        TaskCommands::List { project } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let tasks = ctx.tasks.list_for_project(project_id).await?;
            let out = TaskListOutput {
                total: tasks.len(),
                tasks: tasks.iter().map(TaskOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        TaskCommands::Next { project } => {
            let project_id = resolve_project_id(&ctx.pool, &project).await?;
            let task = ctx.decomposer.next_executable_task(project_id).await?;
            let out = NextTaskOutput { task: task.as_ref().map(TaskOutput::from) };
            output(&out, json_mode);
        }
    }

    Ok(())
}
