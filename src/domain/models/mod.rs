pub mod approval;
pub mod attempt;
pub mod catalog;
pub mod config;
pub mod deliverable;
pub mod escalation;
pub mod gate;
pub mod handoff;
pub mod project;
pub mod proof;
pub mod task;

pub use approval::{ApprovalToken, ACCEPTED_TOKENS};
pub use attempt::{AgentAttempt, AttemptStatus};
pub use catalog::{CategoryPlan, DeliverableSpec, GateCatalog, GateSpec, TaskBlueprint};
pub use config::{
    Config, DatabaseConfig, LoggingConfig, OrchestratorConfig, RetryBudgetConfig, SelfHealConfig,
};
pub use deliverable::{Deliverable, DeliverableStatus};
pub use escalation::{Escalation, EscalationSeverity, EscalationStatus};
pub use gate::{Gate, GateId, GateStatus};
pub use handoff::{Handoff, HandoffStatus};
pub use project::{Project, ProjectCategory};
pub use proof::{latest_per_type, ProofArtifact, ProofType};
pub use task::{Task, TaskStatus};
