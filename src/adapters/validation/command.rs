//! Validator that runs configured shell commands per check stage.
//!
//! Build, lint, and test stages each map to one optional shell command run
//! inside the project's workspace directory. A stage with no command
//! reports no errors; a failing stage contributes the tail of its stderr
//! as that stage's error list.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{ValidationReport, Validator};

/// Stderr lines kept per failing stage.
const MAX_STAGE_ERRORS: usize = 20;

/// Validator backed by per-stage shell commands.
pub struct CommandValidator {
    workspace_root: PathBuf,
    build: Option<String>,
    lint: Option<String>,
    test: Option<String>,
}

impl CommandValidator {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self { workspace_root: workspace_root.into(), build: None, lint: None, test: None }
    }

    pub fn with_build(mut self, command: impl Into<String>) -> Self {
        self.build = Some(command.into());
        self
    }

    pub fn with_lint(mut self, command: impl Into<String>) -> Self {
        self.lint = Some(command.into());
        self
    }

    pub fn with_test(mut self, command: impl Into<String>) -> Self {
        self.test = Some(command.into());
        self
    }

    async fn run_stage(&self, dir: &Path, command: &str) -> DomainResult<Vec<String>> {
        debug!(command, dir = %dir.display(), "running validation stage");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DomainError::ExecutionFailed(format!("failed to run '{command}': {e}"))
            })?;

        if output.status.success() {
            return Ok(Vec::new());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut errors: Vec<String> = stderr
            .lines()
            .rev()
            .take(MAX_STAGE_ERRORS)
            .map(str::to_string)
            .collect();
        errors.reverse();
        if errors.is_empty() {
            errors.push(format!("'{command}' exited with {}", output.status));
        }
        Ok(errors)
    }

    async fn stage_errors(&self, dir: &Path, command: Option<&String>) -> DomainResult<Vec<String>> {
        match command {
            Some(command) => self.run_stage(dir, command).await,
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Validator for CommandValidator {
    async fn run_full_validation(&self, project_id: Uuid) -> DomainResult<ValidationReport> {
        let dir = self.workspace_root.join(project_id.to_string());

        let build_errors = self.stage_errors(&dir, self.build.as_ref()).await?;
        let lint_errors = self.stage_errors(&dir, self.lint.as_ref()).await?;
        let test_errors = self.stage_errors(&dir, self.test.as_ref()).await?;

        let overall_success =
            build_errors.is_empty() && lint_errors.is_empty() && test_errors.is_empty();

        info!(project_id = %project_id, success = overall_success, "validation run finished");

        Ok(ValidationReport { overall_success, build_errors, lint_errors, test_errors })
    }
}
