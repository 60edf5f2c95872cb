//! Agent execution attempt model.
//!
//! One record per invocation of an agent role for a gate. Attempts are
//! immutable once they reach a terminal status, except for warning
//! annotations added by post-processing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::gate::GateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Running,
    Completed,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAttempt {
    pub id: Uuid,
    pub project_id: Uuid,
    pub gate_id: GateId,
    pub role: String,
    pub status: AttemptStatus,
    pub input_summary: String,
    pub output: Option<String>,
    pub error: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Post-processing annotations; the only field mutable after terminal.
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl AgentAttempt {
    /// A new attempt starts RUNNING.
    pub fn start(
        project_id: Uuid,
        gate_id: GateId,
        role: impl Into<String>,
        input_summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            gate_id,
            role: role.into(),
            status: AttemptStatus::Running,
            input_summary: input_summary.into(),
            output: None,
            error: None,
            input_tokens: 0,
            output_tokens: 0,
            warnings: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn complete(&mut self, output: impl Into<String>, input_tokens: u64, output_tokens: u64) {
        self.status = AttemptStatus::Completed;
        self.output = Some(output.into());
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self.ended_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = AttemptStatus::Failed;
        self.error = Some(error.into());
        self.ended_at = Some(Utc::now());
    }

    pub fn annotate(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn duration_secs(&self) -> Option<i64> {
        self.ended_at.map(|end| (end - self.started_at).num_seconds())
    }
}
