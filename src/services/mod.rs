pub mod event_bus;
pub mod gate_orchestrator;
pub mod gate_state_machine;
pub mod progress_tracker;
pub mod self_healing;
pub mod task_decomposer;

pub use event_bus::{
    EventBus, EventBusConfig, EventCategory, EventId, EventPayload, EventSeverity, PipelineEvent,
    SequenceNumber,
};
pub use gate_orchestrator::{GateCheck, GateOrchestrator, GateRound, RoleOutcome};
pub use gate_state_machine::{GateStateMachine, RecoveryReport};
pub use progress_tracker::{evaluate_proofs, role_proofs_satisfied, ProgressTracker, ProofCheck};
pub use self_healing::{RetryOutcome, SelfHealingService};
pub use task_decomposer::{Decomposition, TaskDecomposer};
