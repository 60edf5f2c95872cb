//! Agent executor that spawns an external command per invocation.
//!
//! The configured program is run once per agent execution. It receives the
//! role in the `GATEHOUSE_ROLE` environment variable and the system context
//! plus prompt on stdin; whatever it writes to stdout becomes the agent
//! output. A non-zero exit status is an unsuccessful outcome, not an
//! executor error.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{AgentExecutor, AgentOutcome};

/// Executor backed by an external program.
pub struct CommandAgentExecutor {
    program: String,
    args: Vec<String>,
}

impl CommandAgentExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }
}

#[async_trait]
impl AgentExecutor for CommandAgentExecutor {
    fn name(&self) -> &str {
        "command"
    }

    async fn execute(
        &self,
        role: &str,
        system_context: &str,
        prompt: &str,
    ) -> DomainResult<AgentOutcome> {
        debug!(role, program = %self.program, "spawning agent command");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("GATEHOUSE_ROLE", role)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DomainError::ExecutionFailed(format!("failed to spawn {}: {e}", self.program))
            })?;

        // Feed stdin from a separate task; a child that fills its stdout
        // pipe while we are still writing would otherwise deadlock.
        let stdin = child.stdin.take();
        let input = format!("{system_context}\n\n{prompt}\n");
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(input.as_bytes()).await;
                let _ = stdin.shutdown().await;
            }
        });

        let output = child.wait_with_output().await.map_err(|e| {
            DomainError::ExecutionFailed(format!("failed to wait for {}: {e}", self.program))
        })?;
        let _ = writer.await;

        let content = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            Ok(AgentOutcome::success(content))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("no error output").to_string();
            Ok(AgentOutcome::failure(format!(
                "agent command exited with {}: {detail}",
                output.status
            )))
        }
    }
}
