//! Domain errors for the gatehouse pipeline.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::{GateId, ProjectCategory};

/// The first unmet precondition found by an approval check.
///
/// Rendered into [`DomainError::TransitionDenied`] so callers always see
/// the specific blocker, never a generic "cannot approve".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// Actor is not the project's approving identity.
    NotApprover { expected: String, actual: String },
    /// The gate is already approved; approving twice is a caller bug.
    AlreadyApproved,
    /// The gate is blocked on an external dependency.
    GateBlocked,
    /// The immediately preceding gate in catalog order is not approved.
    PreviousGateUnapproved { previous: GateId },
    /// A proof-requiring gate is missing passing proof artifacts.
    ProofsMissing { missing: Vec<String> },
    /// Not every deliverable for the gate is complete.
    DeliverablesIncomplete { pending: Vec<String> },
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotApprover { expected, actual } => {
                write!(f, "actor '{actual}' is not the approving identity '{expected}'")
            }
            Self::AlreadyApproved => write!(f, "gate is already approved"),
            Self::GateBlocked => write!(f, "gate is blocked on an external dependency"),
            Self::PreviousGateUnapproved { previous } => {
                write!(f, "previous gate {previous} is not approved")
            }
            Self::ProofsMissing { missing } => {
                write!(f, "missing or failing proof artifacts: {}", missing.join(", "))
            }
            Self::DeliverablesIncomplete { pending } => {
                write!(f, "incomplete deliverables: {}", pending.join(", "))
            }
        }
    }
}

/// Domain-level errors that can occur in the gatehouse system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("Gate not found: {gate} for project {project}")]
    GateNotFound { project: Uuid, gate: GateId },

    #[error("Transition denied for gate {gate}: {reason}")]
    TransitionDenied { gate: GateId, reason: String },

    #[error("Approval token '{token}' is ambiguous; use one of: {accepted}")]
    AmbiguousApproval { token: String, accepted: String },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("No catalog entry for category '{category}' gate {gate}")]
    CatalogEntryMissing { category: ProjectCategory, gate: GateId },

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Attempt not found: {0}")]
    AttemptNotFound(Uuid),

    #[error("Escalation not found: {0}")]
    EscalationNotFound(Uuid),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Build a `TransitionDenied` from the reason an approval check returned.
    pub fn denied(gate: GateId, reason: &DenialReason) -> Self {
        Self::TransitionDenied { gate, reason: reason.to_string() }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
