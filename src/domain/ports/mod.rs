//! Port trait definitions (hexagonal architecture).
//!
//! Repository ports cover the durable store; collaborator ports cover the
//! external capabilities the core consumes but never implements: agent
//! execution, file writing, validation, and document generation. Adapters
//! live under `crate::adapters`.

pub mod agent_executor;
pub mod attempt_repository;
pub mod deliverable_repository;
pub mod document_generator;
pub mod escalation_repository;
pub mod gate_repository;
pub mod handoff_repository;
pub mod project_repository;
pub mod proof_repository;
pub mod task_repository;
pub mod validator;
pub mod workspace;

pub use agent_executor::{AgentExecutor, AgentOutcome};
pub use attempt_repository::AttemptRepository;
pub use deliverable_repository::DeliverableRepository;
pub use document_generator::{DocumentGenerator, NullDocumentGenerator};
pub use escalation_repository::EscalationRepository;
pub use gate_repository::{GateApproval, GateRepository};
pub use handoff_repository::HandoffRepository;
pub use project_repository::ProjectRepository;
pub use proof_repository::ProofRepository;
pub use task_repository::TaskRepository;
pub use validator::{ValidationReport, Validator};
pub use workspace::{FilePatch, Workspace};
