//! Common test utilities for integration tests
//!
//! Builds the full service stack over an in-memory migrated database with
//! scripted execution collaborators, plus fixture helpers for projects and
//! gate progress.

use std::sync::Arc;

use gatehouse::adapters::agents::MockAgentExecutor;
use gatehouse::adapters::sqlite::{
    create_migrated_test_pool, SqliteAttemptRepository, SqliteDeliverableRepository,
    SqliteEscalationRepository, SqliteGateRepository, SqliteHandoffRepository,
    SqliteProjectRepository, SqliteProofRepository, SqliteTaskRepository,
};
use gatehouse::adapters::validation::MockValidator;
use gatehouse::adapters::workspace::MockWorkspace;
use gatehouse::application::PipelineRunner;
use gatehouse::domain::models::{
    GateCatalog, GateId, OrchestratorConfig, Project, ProjectCategory, SelfHealConfig,
};
use gatehouse::domain::ports::{
    AttemptRepository, DeliverableRepository, EscalationRepository, GateRepository,
    HandoffRepository, NullDocumentGenerator, ProjectRepository, ProofRepository,
    TaskRepository,
};
use gatehouse::services::{
    EventBus, GateOrchestrator, GateStateMachine, ProgressTracker, SelfHealingService,
    TaskDecomposer,
};

/// Everything an integration test needs, wired over one migrated pool.
pub struct Stack {
    pub projects: Arc<dyn ProjectRepository>,
    pub gates: Arc<dyn GateRepository>,
    pub deliverables: Arc<dyn DeliverableRepository>,
    pub proofs: Arc<dyn ProofRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub handoffs: Arc<dyn HandoffRepository>,
    pub escalations: Arc<dyn EscalationRepository>,
    pub catalog: Arc<GateCatalog>,
    pub events: Arc<EventBus>,
    pub tracker: Arc<ProgressTracker>,
    pub state_machine: Arc<GateStateMachine>,
    pub decomposer: Arc<TaskDecomposer>,
    pub executor: Arc<MockAgentExecutor>,
    pub validator: Arc<MockValidator>,
    pub orchestrator: GateOrchestrator,
}

impl Stack {
    pub fn runner(&self) -> PipelineRunner {
        PipelineRunner::new(
            self.projects.clone(),
            self.gates.clone(),
            self.escalations.clone(),
            self.orchestrator.clone(),
            self.state_machine.clone(),
            self.decomposer.clone(),
            self.events.clone(),
        )
    }
}

/// Default stack: builtin catalog, default limits, scripted collaborators.
pub async fn stack() -> Stack {
    stack_with(OrchestratorConfig::default(), SelfHealConfig::default()).await
}

pub async fn stack_with(
    orchestrator_config: OrchestratorConfig,
    self_heal_config: SelfHealConfig,
) -> Stack {
    build_stack(orchestrator_config, self_heal_config, MockValidator::new()).await
}

/// Stack whose validator is scripted by the caller, for repair paths.
pub async fn stack_with_validator(validator: MockValidator) -> Stack {
    build_stack(OrchestratorConfig::default(), SelfHealConfig::default(), validator).await
}

/// Full control over limits and the validator script.
pub async fn stack_custom(
    orchestrator_config: OrchestratorConfig,
    self_heal_config: SelfHealConfig,
    validator: MockValidator,
) -> Stack {
    build_stack(orchestrator_config, self_heal_config, validator).await
}

async fn build_stack(
    orchestrator_config: OrchestratorConfig,
    self_heal_config: SelfHealConfig,
    validator: MockValidator,
) -> Stack {
    let pool = create_migrated_test_pool().await.unwrap();
    let projects: Arc<dyn ProjectRepository> =
        Arc::new(SqliteProjectRepository::new(pool.clone()));
    let gates: Arc<dyn GateRepository> = Arc::new(SqliteGateRepository::new(pool.clone()));
    let deliverables: Arc<dyn DeliverableRepository> =
        Arc::new(SqliteDeliverableRepository::new(pool.clone()));
    let proofs: Arc<dyn ProofRepository> = Arc::new(SqliteProofRepository::new(pool.clone()));
    let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let attempts: Arc<dyn AttemptRepository> =
        Arc::new(SqliteAttemptRepository::new(pool.clone()));
    let handoffs: Arc<dyn HandoffRepository> =
        Arc::new(SqliteHandoffRepository::new(pool.clone()));
    let escalations: Arc<dyn EscalationRepository> =
        Arc::new(SqliteEscalationRepository::new(pool));

    let executor = Arc::new(MockAgentExecutor::new());
    let validator = Arc::new(validator);
    let workspace = Arc::new(MockWorkspace::new());
    let catalog = Arc::new(GateCatalog::builtin());
    let events = Arc::new(EventBus::default());

    let tracker = Arc::new(ProgressTracker::new(
        deliverables.clone(),
        proofs.clone(),
        catalog.clone(),
        events.clone(),
    ));
    let state_machine = Arc::new(GateStateMachine::new(
        projects.clone(),
        gates.clone(),
        deliverables.clone(),
        tracker.clone(),
        catalog.clone(),
        events.clone(),
    ));
    let decomposer =
        Arc::new(TaskDecomposer::new(tasks.clone(), catalog.clone(), events.clone()));
    let self_heal = Arc::new(SelfHealingService::new(
        projects.clone(),
        attempts.clone(),
        handoffs.clone(),
        escalations.clone(),
        executor.clone(),
        workspace,
        validator.clone(),
        catalog.clone(),
        events.clone(),
        self_heal_config,
    ));
    let orchestrator = GateOrchestrator::new(
        projects.clone(),
        gates.clone(),
        deliverables.clone(),
        proofs.clone(),
        tasks.clone(),
        attempts.clone(),
        handoffs.clone(),
        executor.clone(),
        Arc::new(NullDocumentGenerator),
        validator.clone(),
        state_machine.clone(),
        tracker.clone(),
        self_heal,
        catalog.clone(),
        events.clone(),
        orchestrator_config,
    );

    Stack {
        projects,
        gates,
        deliverables,
        proofs,
        tasks,
        attempts,
        handoffs,
        escalations,
        catalog,
        events,
        tracker,
        state_machine,
        decomposer,
        executor,
        validator,
        orchestrator,
    }
}

/// Insert a standard-category project owned by alice, with its first gate
/// row and task list materialized.
pub async fn start_project(stack: &Stack, name: &str) -> Project {
    let project = Project::new(name, ProjectCategory::Standard, "alice", GateId::G1, "intake");
    stack.projects.insert(&project).await.unwrap();
    stack.state_machine.initialize_gates(&project).await.unwrap();
    stack.decomposer.decompose(&project).await.unwrap();
    project
}

/// Mark every deliverable owed by the gate complete.
pub async fn complete_gate_deliverables(stack: &Stack, project: &Project, gate_id: GateId) {
    let rows = stack.deliverables.list_for_gate(project.id, gate_id).await.unwrap();
    for row in rows {
        stack
            .tracker
            .mark_deliverables_complete(project.id, gate_id, &row.role)
            .await
            .unwrap();
    }
}

/// Record a passing artifact for every proof type the gate requires.
pub async fn satisfy_gate_proofs(stack: &Stack, project: &Project, gate_id: GateId) {
    let spec = stack.catalog.spec(project.category, gate_id).unwrap();
    if !spec.requires_proof {
        return;
    }
    let types = if spec.required_proofs.is_empty() {
        vec![gatehouse::domain::models::ProofType::Build]
    } else {
        spec.required_proofs.clone()
    };
    for proof_type in types {
        stack
            .tracker
            .record_proof(project.id, gate_id, proof_type, true, "clean", "validator")
            .await
            .unwrap();
    }
}

/// Complete a gate's obligations and approve it as the owner, returning the
/// refreshed project.
pub async fn approve_gate(stack: &Stack, project: &Project, gate_id: GateId) -> Project {
    let current = stack.projects.get(project.id).await.unwrap().unwrap();
    stack.state_machine.ensure_exists(&current, gate_id).await.unwrap();
    complete_gate_deliverables(stack, &current, gate_id).await;
    satisfy_gate_proofs(stack, &current, gate_id).await;
    stack.state_machine.transition_to_review(&current, gate_id).await.unwrap();
    stack
        .state_machine
        .approve(project.id, gate_id, "alice", "approved", None)
        .await
        .unwrap();
    stack.projects.get(project.id).await.unwrap().unwrap()
}
