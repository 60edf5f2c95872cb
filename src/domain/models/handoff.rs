//! Handoff model: a recorded transition of responsibility between roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffStatus {
    /// Work continues with the successor; some items remain open.
    Partial,
    Complete,
}

impl HandoffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Partial => "partial",
            Self::Complete => "complete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "partial" => Some(Self::Partial),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

impl std::fmt::Display for HandoffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Created when an agent's output names a successor role, or by the
/// self-healing loop after a successful repair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handoff {
    pub id: Uuid,
    pub project_id: Uuid,
    pub from_role: String,
    pub to_role: String,
    pub phase: String,
    pub status: HandoffStatus,
    pub deliverables: Vec<String>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Handoff {
    pub fn new(
        project_id: Uuid,
        from_role: impl Into<String>,
        to_role: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            from_role: from_role.into(),
            to_role: to_role.into(),
            phase: phase.into(),
            status: HandoffStatus::Complete,
            deliverables: Vec::new(),
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: HandoffStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_deliverables(mut self, deliverables: Vec<String>) -> Self {
        self.deliverables = deliverables;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}
