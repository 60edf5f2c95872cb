//! Deliverable model: a named artifact a role owes to a gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::gate::GateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableStatus {
    NotStarted,
    InProgress,
    Complete,
}

impl DeliverableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(Self::NotStarted),
            "in_progress" => Some(Self::InProgress),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeliverableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Expected artifact for a gate, owned by one role. Created alongside its
/// gate from the catalog spec; never deleted, superseded by the next gate's
/// set. Carries its owning gate id and is always queried with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: Uuid,
    pub project_id: Uuid,
    pub gate_id: GateId,
    pub name: String,
    pub role: String,
    pub status: DeliverableStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deliverable {
    pub fn new(
        project_id: Uuid,
        gate_id: GateId,
        name: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            gate_id,
            name: name.into(),
            role: role.into(),
            status: DeliverableStatus::NotStarted,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == DeliverableStatus::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in
            [DeliverableStatus::NotStarted, DeliverableStatus::InProgress, DeliverableStatus::Complete]
        {
            assert_eq!(DeliverableStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(DeliverableStatus::from_str("done"), None);
    }

    #[test]
    fn new_deliverable_starts_not_started() {
        let d = Deliverable::new(Uuid::new_v4(), GateId::G4, "backend-source", "backend-developer");
        assert_eq!(d.status, DeliverableStatus::NotStarted);
        assert!(!d.is_complete());
    }
}
