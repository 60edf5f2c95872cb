//! Project aggregate root.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::gate::GateId;

/// Project classification. Determines which catalog row set applies: the
/// gate sequence, the roles per gate, and the task decomposition blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectCategory {
    Standard,
    MlAugmented,
    Hybrid,
    Enhancement,
}

impl ProjectCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::MlAugmented => "ml-augmented",
            Self::Hybrid => "hybrid",
            Self::Enhancement => "enhancement",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(Self::Standard),
            "ml-augmented" => Some(Self::MlAugmented),
            "hybrid" => Some(Self::Hybrid),
            "enhancement" => Some(Self::Enhancement),
            _ => None,
        }
    }

    pub fn all() -> [ProjectCategory; 4] {
        [Self::Standard, Self::MlAugmented, Self::Hybrid, Self::Enhancement]
    }
}

impl std::fmt::Display for ProjectCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate root. Owns gates, deliverables, proof artifacts, tasks,
/// handoffs and escalations; nothing is shared across projects.
///
/// Invariant: `current_gate` references an existing gate record for this
/// project, or the terminal marker once the final gate is approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub category: ProjectCategory,
    /// The human approving identity for this project's gates.
    pub owner: String,
    pub current_gate: GateId,
    pub current_phase: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        category: ProjectCategory,
        owner: impl Into<String>,
        first_gate: GateId,
        first_phase: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category,
            owner: owner.into(),
            current_gate: first_gate,
            current_phase: first_phase.into(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Move the pointer to the next gate after an approval.
    pub fn advance_to(&mut self, gate: GateId, phase: impl Into<String>) {
        self.current_gate = gate;
        self.current_phase = phase.into();
        self.updated_at = Utc::now();
    }

    /// Mark the pipeline finished: pointer parks on the terminal marker.
    pub fn mark_complete(&mut self) {
        let now = Utc::now();
        self.current_gate = GateId::Complete;
        self.current_phase = "complete".to_string();
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn is_complete(&self) -> bool {
        self.current_gate.is_terminal()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("project name cannot be empty".to_string());
        }
        if self.owner.trim().is_empty() {
            return Err("project owner cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_strings() {
        for category in ProjectCategory::all() {
            assert_eq!(ProjectCategory::from_str(category.as_str()), Some(category));
        }
        assert_eq!(ProjectCategory::from_str("bespoke"), None);
    }

    #[test]
    fn new_project_starts_at_the_given_gate() {
        let project =
            Project::new("storefront", ProjectCategory::Standard, "alice", GateId::G1, "intake");
        assert_eq!(project.current_gate, GateId::G1);
        assert_eq!(project.current_phase, "intake");
        assert!(!project.is_complete());
    }

    #[test]
    fn mark_complete_parks_pointer_on_terminal_marker() {
        let mut project =
            Project::new("storefront", ProjectCategory::Standard, "alice", GateId::G1, "intake");
        project.mark_complete();
        assert_eq!(project.current_gate, GateId::Complete);
        assert_eq!(project.current_phase, "complete");
        assert!(project.completed_at.is_some());
        assert!(project.is_complete());
    }

    #[test]
    fn validate_rejects_blank_owner() {
        let project = Project::new("x", ProjectCategory::Hybrid, "  ", GateId::G1, "intake");
        assert!(project.validate().is_err());
    }
}
