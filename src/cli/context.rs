//! Shared construction for CLI commands.
//!
//! Every command needs the same stack: configuration, a migrated pool, the
//! catalog, the event bus, and the core services. Commands that execute
//! agents additionally pick an executor and validator, so those enter at
//! the orchestrator step instead of here.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::sqlite::{
    initialize_database, SqliteAttemptRepository, SqliteDeliverableRepository,
    SqliteEscalationRepository, SqliteGateRepository, SqliteHandoffRepository,
    SqliteProjectRepository, SqliteProofRepository, SqliteTaskRepository,
};
use crate::application::PipelineRunner;
use crate::domain::models::{Config, GateCatalog};
use crate::domain::ports::{
    AgentExecutor, AttemptRepository, DeliverableRepository, DocumentGenerator,
    EscalationRepository, GateRepository, HandoffRepository, NullDocumentGenerator,
    ProjectRepository, ProofRepository, TaskRepository, Validator, Workspace,
};
use crate::infrastructure::catalog::CatalogLoader;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{
    EventBus, EventBusConfig, GateOrchestrator, GateStateMachine, ProgressTracker,
    SelfHealingService, TaskDecomposer,
};

/// Agent working directories live under here, one per project.
pub const WORKSPACE_ROOT: &str = ".gatehouse/workspace";

/// Repositories and services shared by every CLI command.
pub struct CliContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub projects: Arc<dyn ProjectRepository>,
    pub gates: Arc<dyn GateRepository>,
    pub deliverables: Arc<dyn DeliverableRepository>,
    pub proofs: Arc<dyn ProofRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub handoffs: Arc<dyn HandoffRepository>,
    pub catalog: Arc<GateCatalog>,
    pub events: Arc<EventBus>,
    pub tracker: Arc<ProgressTracker>,
    pub state_machine: Arc<GateStateMachine>,
    pub decomposer: Arc<TaskDecomposer>,
    pub escalations: Arc<dyn EscalationRepository>,
}

impl CliContext {
    /// Load configuration from the standard locations and build the stack.
    pub async fn load() -> Result<Self> {
        let config = ConfigLoader::load().context("Failed to load configuration")?;
        Self::from_config(config).await
    }

    /// Build the stack from an already-loaded configuration.
    pub async fn from_config(config: Config) -> Result<Self> {
        let pool = initialize_database(&config.database.url)
            .await
            .context("Failed to open the database. Run 'gatehouse init' first.")?;

        let catalog = Arc::new(
            CatalogLoader::load(config.catalog_path.as_deref())
                .context("Failed to load the gate catalog")?,
        );

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
            Arc::new(SqliteEscalationRepository::new(pool.clone()));

        let events = Arc::new(EventBus::new(EventBusConfig::default()));
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

        Ok(Self {
            config,
            pool,
            projects,
            gates,
            deliverables,
            proofs,
            tasks,
            attempts,
            handoffs,
            catalog,
            events,
            tracker,
            state_machine,
            decomposer,
            escalations,
        })
    }

    /// Orchestrator over this context with the chosen execution collaborators.
    pub fn orchestrator(
        &self,
        executor: Arc<dyn AgentExecutor>,
        validator: Arc<dyn Validator>,
        workspace: Arc<dyn Workspace>,
    ) -> GateOrchestrator {
        let documents: Arc<dyn DocumentGenerator> = Arc::new(NullDocumentGenerator);
        let self_heal = Arc::new(SelfHealingService::new(
            self.projects.clone(),
            self.attempts.clone(),
            self.handoffs.clone(),
            self.escalations.clone(),
            executor.clone(),
            workspace,
            validator.clone(),
            self.catalog.clone(),
            self.events.clone(),
            self.config.self_heal.clone(),
        ));

        GateOrchestrator::new(
            self.projects.clone(),
            self.gates.clone(),
            self.deliverables.clone(),
            self.proofs.clone(),
            self.tasks.clone(),
            self.attempts.clone(),
            self.handoffs.clone(),
            executor,
            documents,
            validator,
            self.state_machine.clone(),
            self.tracker.clone(),
            self_heal,
            self.catalog.clone(),
            self.events.clone(),
            self.config.orchestrator.clone(),
        )
    }

    /// Pipeline runner over this context and an orchestrator.
    pub fn runner(&self, orchestrator: GateOrchestrator) -> PipelineRunner {
        PipelineRunner::new(
            self.projects.clone(),
            self.gates.clone(),
            self.escalations.clone(),
            orchestrator,
            self.state_machine.clone(),
            self.decomposer.clone(),
            self.events.clone(),
        )
    }
}
