//! Gate checkpoint model.
//!
//! A gate is one checkpoint in a fixed, ordered sequence. Work for a gate is
//! produced by agents; a human gatekeeper approves the gate before the next
//! one's work begins. Gate records are created lazily in catalog order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a checkpoint in the pipeline sequence.
///
/// The ordinal is display-only; ordering authority is the catalog sequence
/// for the project's category. `Complete` is the terminal marker the project
/// pointer moves to once the final gate is approved; no gate record exists
/// for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GateId {
    G1,
    G2,
    G3,
    G4,
    G5,
    G6,
    G7,
    G8,
    G9,
    #[serde(rename = "COMPLETE")]
    Complete,
}

impl GateId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::G1 => "G1",
            Self::G2 => "G2",
            Self::G3 => "G3",
            Self::G4 => "G4",
            Self::G5 => "G5",
            Self::G6 => "G6",
            Self::G7 => "G7",
            Self::G8 => "G8",
            Self::G9 => "G9",
            Self::Complete => "COMPLETE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "G1" => Some(Self::G1),
            "G2" => Some(Self::G2),
            "G3" => Some(Self::G3),
            "G4" => Some(Self::G4),
            "G5" => Some(Self::G5),
            "G6" => Some(Self::G6),
            "G7" => Some(Self::G7),
            "G8" => Some(Self::G8),
            "G9" => Some(Self::G9),
            "COMPLETE" => Some(Self::Complete),
            _ => None,
        }
    }

    /// The terminal marker is not a real gate; no record is created for it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a gate instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// Created, work not yet complete.
    Pending,
    /// All required work is present; awaiting the human gatekeeper.
    InReview,
    /// Approved by the gatekeeper. Terminal.
    Approved,
    /// Rejected by the gatekeeper. Terminal; remediation happens outside.
    Rejected,
    /// Blocked on an external dependency. Not originated by this crate.
    Blocked,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Blocked => "blocked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_review" => Some(Self::InReview),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Statuses reachable from this one.
    pub fn valid_transitions(&self) -> Vec<GateStatus> {
        match self {
            Self::Pending => vec![Self::InReview, Self::Blocked],
            Self::InReview => vec![Self::Approved, Self::Rejected, Self::Blocked],
            Self::Blocked => vec![Self::Pending, Self::InReview],
            Self::Approved | Self::Rejected => vec![],
        }
    }

    pub fn can_transition_to(&self, target: GateStatus) -> bool {
        self.valid_transitions().contains(&target)
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One gate instance for a (project, gate-id) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub id: Uuid,
    pub project_id: Uuid,
    pub gate_id: GateId,
    pub status: GateStatus,
    pub requires_proof: bool,
    pub passing_criteria: String,
    /// Set only on approval.
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    /// Set only on rejection.
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Gate {
    pub fn new(project_id: Uuid, gate_id: GateId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            gate_id,
            status: GateStatus::Pending,
            requires_proof: false,
            passing_criteria: String::new(),
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_requires_proof(mut self, requires_proof: bool) -> Self {
        self.requires_proof = requires_proof;
        self
    }

    pub fn with_passing_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.passing_criteria = criteria.into();
        self
    }

    /// Validated status change. Approval and rejection carry their own
    /// bookkeeping, so they go through [`Gate::approve`] / [`Gate::reject`].
    pub fn transition_to(&mut self, target: GateStatus) -> Result<(), String> {
        if self.status == target {
            return Ok(());
        }
        if !self.status.can_transition_to(target) {
            return Err(format!(
                "invalid gate transition from {} to {}",
                self.status, target
            ));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the gate approved. Callers must have verified preconditions.
    pub fn approve(&mut self, actor: &str, notes: Option<String>) -> Result<(), String> {
        if self.status.is_terminal() {
            return Err(format!("gate {} is terminal ({})", self.gate_id, self.status));
        }
        let now = Utc::now();
        self.status = GateStatus::Approved;
        self.approved_by = Some(actor.to_string());
        self.approved_at = Some(now);
        if notes.is_some() {
            self.notes = notes;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(&mut self, reason: &str) -> Result<(), String> {
        if self.status.is_terminal() {
            return Err(format!("gate {} is terminal ({})", self.gate_id, self.status));
        }
        self.status = GateStatus::Rejected;
        self.rejection_reason = Some(reason.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_approved(&self) -> bool {
        self.status == GateStatus::Approved
    }
}
