//! Category-driven task decomposition.
//!
//! Each project category carries a task blueprint in the catalog. The
//! decomposer turns it into persisted task rows once, resolving role-level
//! dependencies to concrete parent references, and answers "what should run
//! next" from the stored rows afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{GateCatalog, Project, Task, TaskStatus};
use crate::domain::ports::TaskRepository;
use crate::services::event_bus::{EventBus, EventPayload};

/// A project's planned work: ordered tasks plus the roles that may run
/// concurrently.
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub tasks: Vec<Task>,
    pub parallel_groups: Vec<Vec<String>>,
}

/// Expands a category blueprint into task rows.
pub struct TaskDecomposer {
    tasks: Arc<dyn TaskRepository>,
    catalog: Arc<GateCatalog>,
    events: Arc<EventBus>,
}

impl TaskDecomposer {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        catalog: Arc<GateCatalog>,
        events: Arc<EventBus>,
    ) -> Self {
        Self { tasks, catalog, events }
    }

    /// Create the project's task list from its category blueprint.
    ///
    /// Deterministic per category. A `depends_on_role` in the blueprint
    /// resolves to the nearest earlier task owned by that role; a dependency
    /// on a role with no earlier task is dropped with a warning rather than
    /// inventing order. Idempotent: a second call returns the stored rows
    /// without inserting duplicates.
    pub async fn decompose(&self, project: &Project) -> DomainResult<Decomposition> {
        let plan = self.catalog.plan(project.category).ok_or_else(|| {
            DomainError::ValidationFailed(format!(
                "no catalog plan for category '{}'",
                project.category
            ))
        })?;

        let existing = self.tasks.list_for_project(project.id).await?;
        if !existing.is_empty() {
            tracing::debug!(
                project_id = %project.id,
                task_count = existing.len(),
                "decomposition already exists"
            );
            return Ok(Decomposition {
                tasks: existing,
                parallel_groups: plan.parallel_groups.clone(),
            });
        }

        let mut tasks: Vec<Task> = Vec::with_capacity(plan.tasks.len());
        for (position, blueprint) in plan.tasks.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let mut task = Task::new(
                project.id,
                blueprint.description.clone(),
                blueprint.role.clone(),
                position as u32,
            );
            if let Some(dependency_role) = &blueprint.depends_on_role {
                match nearest_earlier(&tasks, dependency_role) {
                    Some(parent_id) => task = task.with_parent(parent_id),
                    None => tracing::warn!(
                        project_id = %project.id,
                        role = %blueprint.role,
                        dependency = %dependency_role,
                        "blueprint dependency has no earlier task; leaving task unparented"
                    ),
                }
            }
            tasks.push(task);
        }

        self.tasks.insert_many(&tasks).await?;
        tracing::info!(
            project_id = %project.id,
            category = %project.category,
            task_count = tasks.len(),
            "project decomposed into tasks"
        );
        self.events.emit(EventPayload::TasksDecomposed {
            project_id: project.id,
            task_count: tasks.len(),
        });

        Ok(Decomposition { tasks, parallel_groups: plan.parallel_groups.clone() })
    }

    /// First `not_started` task in creation order whose parent, if any, is
    /// complete. `None` when nothing is ready.
    pub async fn next_executable_task(&self, project_id: Uuid) -> DomainResult<Option<Task>> {
        let tasks = self.tasks.list_for_project(project_id).await?;
        let by_id: HashMap<Uuid, TaskStatus> =
            tasks.iter().map(|t| (t.id, t.status)).collect();
        Ok(tasks
            .into_iter()
            .filter(|t| t.status == TaskStatus::NotStarted)
            .find(|t| match t.parent_id {
                None => true,
                Some(parent_id) => {
                    by_id.get(&parent_id).is_some_and(|s| *s == TaskStatus::Complete)
                }
            }))
    }
}

/// Most recent task before the cursor owned by `role`.
fn nearest_earlier(tasks: &[Task], role: &str) -> Option<Uuid> {
    tasks.iter().rev().find(|t| t.role == role).map(|t| t.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteProjectRepository, SqliteTaskRepository,
    };
    use crate::domain::models::{GateId, ProjectCategory};
    use crate::domain::ports::ProjectRepository;

    struct Fixture {
        decomposer: TaskDecomposer,
        tasks: Arc<dyn TaskRepository>,
        projects: Arc<dyn ProjectRepository>,
    }

    async fn fixture() -> Fixture {
        let pool = create_migrated_test_pool().await.unwrap();
        let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let projects: Arc<dyn ProjectRepository> = Arc::new(SqliteProjectRepository::new(pool));
        let decomposer = TaskDecomposer::new(
            tasks.clone(),
            Arc::new(GateCatalog::builtin()),
            Arc::new(EventBus::default()),
        );
        Fixture { decomposer, tasks, projects }
    }

    async fn project(fx: &Fixture, category: ProjectCategory) -> Project {
        let project = Project::new("webshop", category, "alice", GateId::G1, "intake");
        fx.projects.insert(&project).await.unwrap();
        project
    }

    #[tokio::test]
    async fn decompose_persists_blueprint_tasks_in_order() {
        let fx = fixture().await;
        let project = project(&fx, ProjectCategory::Standard).await;

        let decomposition = fx.decomposer.decompose(&project).await.unwrap();
        assert!(!decomposition.tasks.is_empty());

        let stored = fx.tasks.list_for_project(project.id).await.unwrap();
        assert_eq!(stored.len(), decomposition.tasks.len());
        for (position, task) in stored.iter().enumerate() {
            assert_eq!(task.position as usize, position);
            assert_eq!(task.status, TaskStatus::NotStarted);
        }
    }

    #[tokio::test]
    async fn decompose_resolves_role_dependencies_to_parents() {
        let fx = fixture().await;
        let project = project(&fx, ProjectCategory::Standard).await;

        let decomposition = fx.decomposer.decompose(&project).await.unwrap();
        let with_parents: Vec<&Task> =
            decomposition.tasks.iter().filter(|t| t.parent_id.is_some()).collect();
        assert!(!with_parents.is_empty(), "standard blueprint declares dependencies");

        // Every parent reference points at an earlier task in the list.
        for task in with_parents {
            let parent_id = task.parent_id.unwrap();
            let parent = decomposition
                .tasks
                .iter()
                .find(|t| t.id == parent_id)
                .expect("parent must be part of the decomposition");
            assert!(parent.position < task.position);
        }
    }

    #[tokio::test]
    async fn decompose_twice_returns_the_existing_rows() {
        let fx = fixture().await;
        let project = project(&fx, ProjectCategory::Standard).await;

        let first = fx.decomposer.decompose(&project).await.unwrap();
        let second = fx.decomposer.decompose(&project).await.unwrap();
        assert_eq!(first.tasks.len(), second.tasks.len());

        let count = fx.tasks.count_for_project(project.id).await.unwrap();
        assert_eq!(count as usize, first.tasks.len());
    }

    #[tokio::test]
    async fn parallel_groups_come_from_the_category_plan() {
        let fx = fixture().await;
        let project = project(&fx, ProjectCategory::Standard).await;

        let decomposition = fx.decomposer.decompose(&project).await.unwrap();
        assert!(decomposition
            .parallel_groups
            .iter()
            .any(|group| group.contains(&"backend-developer".to_string())
                && group.contains(&"frontend-developer".to_string())));
    }

    #[tokio::test]
    async fn next_executable_skips_tasks_with_incomplete_parents() {
        let fx = fixture().await;
        let project_id = project(&fx, ProjectCategory::Standard).await.id;
        let parent = Task::new(project_id, "design schema", "architect", 0);
        let child =
            Task::new(project_id, "implement schema", "backend-developer", 1)
                .with_parent(parent.id);
        fx.tasks.insert_many(&[parent.clone(), child.clone()]).await.unwrap();

        // Parent not started: it is itself the next executable task.
        let next = fx.decomposer.next_executable_task(project_id).await.unwrap().unwrap();
        assert_eq!(next.id, parent.id);

        // Parent complete: the child becomes eligible.
        fx.tasks.update_status(parent.id, TaskStatus::Complete).await.unwrap();
        let next = fx.decomposer.next_executable_task(project_id).await.unwrap().unwrap();
        assert_eq!(next.id, child.id);

        fx.tasks.update_status(child.id, TaskStatus::Complete).await.unwrap();
        assert!(fx.decomposer.next_executable_task(project_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_progress_parent_keeps_the_child_waiting() {
        let fx = fixture().await;
        let project_id = project(&fx, ProjectCategory::Standard).await.id;
        let parent = Task::new(project_id, "train model", "ml-engineer", 0);
        let child = Task::new(project_id, "integrate model", "integration-engineer", 1)
            .with_parent(parent.id);
        fx.tasks.insert_many(&[parent.clone(), child]).await.unwrap();

        fx.tasks.update_status(parent.id, TaskStatus::InProgress).await.unwrap();
        assert!(fx.decomposer.next_executable_task(project_id).await.unwrap().is_none());
    }
}
