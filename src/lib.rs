//! Gatehouse - gate-driven pipeline orchestrator
//!
//! Gatehouse drives a project through a fixed sequence of approval gates.
//! Each gate owes deliverables and proof artifacts; agent roles fan out
//! concurrently to produce them, failed validation triggers bounded
//! self-healing, and a human approval moves the pipeline pointer forward.
//!
//! # Architecture
//!
//! The crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors, and the port traits
//! - **Service Layer** (`services`): gate state machine, orchestrator,
//!   progress tracking, self-healing, task decomposition, events
//! - **Application Layer** (`application`): the pipeline runner
//! - **Adapters** (`adapters`): SQLite persistence, agent executors,
//!   validators, workspaces
//! - **Infrastructure Layer** (`infrastructure`): configuration, catalog
//!   loading, logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{PipelineRunner, RunHalt, RunSummary};
pub use domain::models::{
    AgentAttempt, AttemptStatus, Config, Deliverable, DeliverableStatus, Escalation,
    EscalationSeverity, EscalationStatus, Gate, GateCatalog, GateId, GateStatus, Handoff,
    Project, ProjectCategory, ProofArtifact, ProofType, Task, TaskStatus,
};
pub use domain::ports::{
    AgentExecutor, AttemptRepository, DeliverableRepository, EscalationRepository,
    GateRepository, HandoffRepository, ProjectRepository, ProofRepository, TaskRepository,
    Validator, Workspace,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    GateOrchestrator, GateStateMachine, ProgressTracker, SelfHealingService, TaskDecomposer,
};
