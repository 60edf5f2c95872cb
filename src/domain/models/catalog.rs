//! Gate catalog: the static configuration driving the pipeline.
//!
//! For each (project category, gate id) pair the catalog defines the
//! participating roles, the deliverables they owe, the proof artifacts the
//! gate demands, the entry guard, and human-readable passing criteria. It
//! also carries the per-category task blueprints the decomposer expands.
//!
//! The catalog is immutable after construction and injected into services.
//! `builtin()` covers all four categories; deployments can override it from
//! a YAML file (see `infrastructure::catalog`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::gate::GateId;
use super::project::ProjectCategory;
use super::proof::ProofType;

/// A named artifact one role owes to a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverableSpec {
    pub name: String,
    pub role: String,
}

impl DeliverableSpec {
    fn new(name: &str, role: &str) -> Self {
        Self { name: name.to_string(), role: role.to_string() }
    }
}

/// Catalog row for one gate within one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSpec {
    pub gate_id: GateId,
    pub name: String,
    /// Project phase label while this gate is current.
    pub phase: String,
    /// Participating agent roles; empty means a human-only gate.
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<DeliverableSpec>,
    #[serde(default)]
    pub requires_proof: bool,
    /// Gate-wide proof types that must pass, including end-to-end signals.
    /// Empty on a proof-requiring gate means "at least one passing artifact
    /// of any type".
    #[serde(default)]
    pub required_proofs: Vec<ProofType>,
    /// Proof types every participating role must individually pass.
    #[serde(default)]
    pub role_proofs: Vec<ProofType>,
    /// Gate that must be APPROVED before this gate's agents may start.
    #[serde(default)]
    pub entry_requires: Option<GateId>,
    pub passing_criteria: String,
}

impl GateSpec {
    fn new(gate_id: GateId, name: &str, phase: &str, criteria: &str) -> Self {
        Self {
            gate_id,
            name: name.to_string(),
            phase: phase.to_string(),
            roles: Vec::new(),
            deliverables: Vec::new(),
            requires_proof: false,
            required_proofs: Vec::new(),
            role_proofs: Vec::new(),
            entry_requires: None,
            passing_criteria: criteria.to_string(),
        }
    }

    fn roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| (*r).to_string()).collect();
        self
    }

    fn deliverables(mut self, specs: &[(&str, &str)]) -> Self {
        self.deliverables = specs.iter().map(|(n, r)| DeliverableSpec::new(n, r)).collect();
        self
    }

    fn proofs(mut self, required: &[ProofType], per_role: &[ProofType]) -> Self {
        self.requires_proof = true;
        self.required_proofs = required.to_vec();
        self.role_proofs = per_role.to_vec();
        self
    }

    /// Proof-requiring gate with no specific type list: any passing
    /// artifact satisfies it.
    fn proofs_any(mut self) -> Self {
        self.requires_proof = true;
        self
    }

    fn entry_requires(mut self, gate: GateId) -> Self {
        self.entry_requires = Some(gate);
        self
    }
}

/// One step of a category's decomposition blueprint. `depends_on_role`
/// resolves to the nearest earlier task owned by that role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBlueprint {
    pub description: String,
    pub role: String,
    #[serde(default)]
    pub depends_on_role: Option<String>,
}

impl TaskBlueprint {
    fn new(description: &str, role: &str, depends_on_role: Option<&str>) -> Self {
        Self {
            description: description.to_string(),
            role: role.to_string(),
            depends_on_role: depends_on_role.map(str::to_string),
        }
    }
}

/// Everything the catalog knows about one project category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPlan {
    pub sequence: Vec<GateId>,
    pub gates: Vec<GateSpec>,
    #[serde(default)]
    pub tasks: Vec<TaskBlueprint>,
    /// Roles whose implementation work may run concurrently.
    #[serde(default)]
    pub parallel_groups: Vec<Vec<String>>,
}

/// Immutable lookup keyed by (category, gate id).
#[derive(Debug, Clone)]
pub struct GateCatalog {
    plans: HashMap<ProjectCategory, CategoryPlan>,
}

impl GateCatalog {
    pub fn new(plans: HashMap<ProjectCategory, CategoryPlan>) -> Self {
        Self { plans }
    }

    /// The shipped catalog covering all four categories.
    pub fn builtin() -> Self {
        let mut plans = HashMap::new();
        plans.insert(ProjectCategory::Standard, standard_plan());
        plans.insert(ProjectCategory::MlAugmented, ml_augmented_plan());
        plans.insert(ProjectCategory::Hybrid, hybrid_plan());
        plans.insert(ProjectCategory::Enhancement, enhancement_plan());
        Self { plans }
    }

    pub fn plan(&self, category: ProjectCategory) -> Option<&CategoryPlan> {
        self.plans.get(&category)
    }

    pub fn sequence(&self, category: ProjectCategory) -> &[GateId] {
        self.plans.get(&category).map_or(&[], |p| p.sequence.as_slice())
    }

    pub fn spec(&self, category: ProjectCategory, gate_id: GateId) -> Option<&GateSpec> {
        self.plans
            .get(&category)?
            .gates
            .iter()
            .find(|spec| spec.gate_id == gate_id)
    }

    pub fn first_gate(&self, category: ProjectCategory) -> Option<GateId> {
        self.sequence(category).first().copied()
    }

    /// Position of a gate within its category sequence.
    pub fn position(&self, category: ProjectCategory, gate_id: GateId) -> Option<usize> {
        self.sequence(category).iter().position(|g| *g == gate_id)
    }

    /// Next gate in catalog order; `None` when `gate_id` is the last.
    pub fn next_gate(&self, category: ProjectCategory, gate_id: GateId) -> Option<GateId> {
        let sequence = self.sequence(category);
        let pos = sequence.iter().position(|g| *g == gate_id)?;
        sequence.get(pos + 1).copied()
    }

    /// Immediately preceding gate; `None` for the first gate.
    pub fn previous_gate(&self, category: ProjectCategory, gate_id: GateId) -> Option<GateId> {
        let sequence = self.sequence(category);
        let pos = sequence.iter().position(|g| *g == gate_id)?;
        pos.checked_sub(1).and_then(|p| sequence.get(p)).copied()
    }

    pub fn is_last_gate(&self, category: ProjectCategory, gate_id: GateId) -> bool {
        self.sequence(category).last() == Some(&gate_id)
    }

    /// Role an agent hands off to after finishing its slot in a gate: the
    /// next role of the same gate, else the first role of a later gate.
    pub fn successor_role(
        &self,
        category: ProjectCategory,
        gate_id: GateId,
        role: &str,
    ) -> Option<String> {
        let spec = self.spec(category, gate_id)?;
        if let Some(pos) = spec.roles.iter().position(|r| r == role) {
            if let Some(next) = spec.roles.get(pos + 1) {
                return Some(next.clone());
            }
        }
        let mut cursor = gate_id;
        while let Some(next_gate) = self.next_gate(category, cursor) {
            if let Some(next_spec) = self.spec(category, next_gate) {
                if let Some(first) = next_spec.roles.first() {
                    return Some(first.clone());
                }
            }
            cursor = next_gate;
        }
        None
    }

    /// Every role named anywhere in a category's gate specs.
    pub fn known_roles(&self, category: ProjectCategory) -> Vec<String> {
        let mut roles: Vec<String> = Vec::new();
        if let Some(plan) = self.plans.get(&category) {
            for spec in &plan.gates {
                for role in &spec.roles {
                    if !roles.contains(role) {
                        roles.push(role.clone());
                    }
                }
            }
        }
        roles
    }

    /// Internal consistency check, run after loading an override file.
    pub fn validate(&self) -> Result<(), String> {
        for (category, plan) in &self.plans {
            if plan.sequence.is_empty() {
                return Err(format!("category '{category}' has an empty gate sequence"));
            }
            for gate_id in &plan.sequence {
                if gate_id.is_terminal() {
                    return Err(format!(
                        "category '{category}' lists the terminal marker in its sequence"
                    ));
                }
                let Some(spec) = plan.gates.iter().find(|s| s.gate_id == *gate_id) else {
                    return Err(format!("category '{category}' is missing a spec for {gate_id}"));
                };
                for deliverable in &spec.deliverables {
                    if !spec.roles.contains(&deliverable.role) {
                        return Err(format!(
                            "category '{category}' gate {gate_id}: deliverable '{}' owned by \
                             '{}' which is not a participating role",
                            deliverable.name, deliverable.role
                        ));
                    }
                }
                if let Some(required) = spec.entry_requires {
                    let own = plan.sequence.iter().position(|g| *g == *gate_id);
                    let req = plan.sequence.iter().position(|g| *g == required);
                    match (own, req) {
                        (Some(own), Some(req)) if req < own => {}
                        _ => {
                            return Err(format!(
                                "category '{category}' gate {gate_id}: entry guard {required} \
                                 is not an earlier gate in the sequence"
                            ));
                        }
                    }
                }
            }
            for (idx, task) in plan.tasks.iter().enumerate() {
                if let Some(dep) = &task.depends_on_role {
                    let found = plan.tasks[..idx].iter().any(|t| &t.role == dep);
                    if !found {
                        return Err(format!(
                            "category '{category}' task {idx}: depends on role '{dep}' with no \
                             earlier task"
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn standard_plan() -> CategoryPlan {
    CategoryPlan {
        sequence: vec![
            GateId::G1,
            GateId::G2,
            GateId::G3,
            GateId::G4,
            GateId::G5,
            GateId::G6,
            GateId::G7,
            GateId::G8,
            GateId::G9,
        ],
        gates: vec![
            GateSpec::new(
                GateId::G1,
                "Requirements Intake",
                "intake",
                "Problem, users, and success measures are written down and scoped",
            )
            .roles(&["requirements-analyst"])
            .deliverables(&[("requirements-brief", "requirements-analyst")]),
            GateSpec::new(
                GateId::G2,
                "Specification",
                "specification",
                "Functional specification covers every requirement in the brief",
            )
            .roles(&["spec-writer"])
            .deliverables(&[("functional-spec", "spec-writer")]),
            GateSpec::new(
                GateId::G3,
                "Architecture",
                "design",
                "Architecture and data model reviewed against the specification",
            )
            .roles(&["architect"])
            .deliverables(&[("architecture-doc", "architect"), ("data-model", "architect")]),
            GateSpec::new(
                GateId::G4,
                "Implementation",
                "development",
                "Application builds, lints clean, and runs end to end",
            )
            .roles(&["backend-developer", "frontend-developer"])
            .deliverables(&[
                ("backend-source", "backend-developer"),
                ("frontend-source", "frontend-developer"),
            ])
            .proofs(
                &[ProofType::Build, ProofType::Lint, ProofType::Runtime],
                &[ProofType::Build, ProofType::Lint],
            )
            .entry_requires(GateId::G3),
            GateSpec::new(
                GateId::G5,
                "Quality",
                "quality",
                "Test suite passes with the agreed coverage",
            )
            .roles(&["qa-engineer"])
            .deliverables(&[("test-report", "qa-engineer")])
            .proofs(&[ProofType::Test], &[ProofType::Test]),
            GateSpec::new(
                GateId::G6,
                "Security Review",
                "security",
                "No unresolved high or critical findings",
            )
            .roles(&["security-auditor"])
            .deliverables(&[("security-report", "security-auditor")])
            .proofs(&[ProofType::SecurityScan], &[]),
            GateSpec::new(
                GateId::G7,
                "Release Readiness",
                "release",
                "Release artifacts staged and reproducible",
            )
            .roles(&["release-engineer"])
            .deliverables(&[("deployment-manifest", "release-engineer")])
            .proofs_any(),
            GateSpec::new(
                GateId::G8,
                "Documentation",
                "documentation",
                "User-facing documentation covers the shipped surface",
            )
            .roles(&["technical-writer"])
            .deliverables(&[("user-guide", "technical-writer")]),
            GateSpec::new(
                GateId::G9,
                "Final Acceptance",
                "acceptance",
                "Product owner signs off on the delivered product",
            ),
        ],
        tasks: vec![
            TaskBlueprint::new(
                "Interview stakeholders and write the requirements brief",
                "requirements-analyst",
                None,
            ),
            TaskBlueprint::new(
                "Write the functional specification",
                "spec-writer",
                Some("requirements-analyst"),
            ),
            TaskBlueprint::new(
                "Design the architecture and data model",
                "architect",
                Some("spec-writer"),
            ),
            TaskBlueprint::new(
                "Implement backend services and persistence",
                "backend-developer",
                Some("architect"),
            ),
            TaskBlueprint::new(
                "Implement the frontend application",
                "frontend-developer",
                Some("architect"),
            ),
            TaskBlueprint::new(
                "Write and run the acceptance test suite",
                "qa-engineer",
                Some("backend-developer"),
            ),
            TaskBlueprint::new("Audit the security posture", "security-auditor", Some("qa-engineer")),
            TaskBlueprint::new(
                "Prepare deployment manifests and release notes",
                "release-engineer",
                Some("security-auditor"),
            ),
            TaskBlueprint::new("Write the user guide", "technical-writer", Some("release-engineer")),
        ],
        parallel_groups: vec![vec![
            "backend-developer".to_string(),
            "frontend-developer".to_string(),
        ]],
    }
}

fn ml_augmented_plan() -> CategoryPlan {
    let mut plan = standard_plan();
    for spec in &mut plan.gates {
        match spec.gate_id {
            GateId::G4 => {
                spec.roles.push("ml-engineer".to_string());
                spec.deliverables.push(DeliverableSpec::new("model-pipeline", "ml-engineer"));
            }
            GateId::G5 => {
                spec.roles.push("ml-engineer".to_string());
                spec.deliverables.push(DeliverableSpec::new("evaluation-report", "ml-engineer"));
            }
            _ => {}
        }
    }
    let architect_dep = Some("architect");
    plan.tasks.insert(
        5,
        TaskBlueprint::new("Build the model training pipeline", "ml-engineer", architect_dep),
    );
    plan.tasks.insert(
        6,
        TaskBlueprint::new(
            "Evaluate model quality against the baseline",
            "ml-engineer",
            Some("ml-engineer"),
        ),
    );
    plan.parallel_groups = vec![vec![
        "backend-developer".to_string(),
        "frontend-developer".to_string(),
        "ml-engineer".to_string(),
    ]];
    plan
}

fn hybrid_plan() -> CategoryPlan {
    let mut plan = standard_plan();
    for spec in &mut plan.gates {
        if spec.gate_id == GateId::G4 {
            spec.roles.push("integration-engineer".to_string());
            spec.deliverables
                .push(DeliverableSpec::new("integration-adapters", "integration-engineer"));
        }
    }
    plan.tasks.insert(
        5,
        TaskBlueprint::new(
            "Wire external system integrations",
            "integration-engineer",
            Some("architect"),
        ),
    );
    plan.parallel_groups = vec![vec![
        "backend-developer".to_string(),
        "frontend-developer".to_string(),
        "integration-engineer".to_string(),
    ]];
    plan
}

fn enhancement_plan() -> CategoryPlan {
    CategoryPlan {
        sequence: vec![GateId::G1, GateId::G4, GateId::G5, GateId::G9],
        gates: vec![
            GateSpec::new(
                GateId::G1,
                "Change Intake",
                "intake",
                "Enhancement scoped against the existing system",
            )
            .roles(&["requirements-analyst"])
            .deliverables(&[("change-brief", "requirements-analyst")]),
            GateSpec::new(
                GateId::G4,
                "Implementation",
                "development",
                "Change builds and lints clean within the existing system",
            )
            .roles(&["backend-developer"])
            .deliverables(&[("patch-source", "backend-developer")])
            .proofs(&[ProofType::Build, ProofType::Lint], &[ProofType::Build, ProofType::Lint])
            .entry_requires(GateId::G1),
            GateSpec::new(
                GateId::G5,
                "Regression",
                "quality",
                "Regression suite passes with no new failures",
            )
            .roles(&["qa-engineer"])
            .deliverables(&[("regression-report", "qa-engineer")])
            .proofs(&[ProofType::Test], &[ProofType::Test]),
            GateSpec::new(
                GateId::G9,
                "Acceptance",
                "acceptance",
                "Requester confirms the enhancement behaves as asked",
            ),
        ],
        tasks: vec![
            TaskBlueprint::new(
                "Scope the enhancement and capture the change brief",
                "requirements-analyst",
                None,
            ),
            TaskBlueprint::new(
                "Implement the change behind the existing interfaces",
                "backend-developer",
                Some("requirements-analyst"),
            ),
            TaskBlueprint::new(
                "Run the regression suite against the change",
                "qa-engineer",
                Some("backend-developer"),
            ),
        ],
        parallel_groups: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_validates() {
        let catalog = GateCatalog::builtin();
        catalog.validate().expect("builtin catalog must be internally consistent");
    }

    #[test]
    fn every_category_has_a_plan() {
        let catalog = GateCatalog::builtin();
        for category in ProjectCategory::all() {
            assert!(catalog.plan(category).is_some(), "missing plan for {category}");
            assert!(catalog.first_gate(category).is_some());
        }
    }

    #[test]
    fn next_gate_follows_catalog_order_not_ordinals() {
        let catalog = GateCatalog::builtin();
        // Enhancement skips G2/G3: order comes from the sequence.
        assert_eq!(catalog.next_gate(ProjectCategory::Enhancement, GateId::G1), Some(GateId::G4));
        assert_eq!(catalog.next_gate(ProjectCategory::Enhancement, GateId::G5), Some(GateId::G9));
        assert_eq!(catalog.next_gate(ProjectCategory::Enhancement, GateId::G9), None);
        assert_eq!(catalog.next_gate(ProjectCategory::Standard, GateId::G4), Some(GateId::G5));
    }

    #[test]
    fn previous_gate_is_none_for_the_first() {
        let catalog = GateCatalog::builtin();
        assert_eq!(catalog.previous_gate(ProjectCategory::Standard, GateId::G1), None);
        assert_eq!(catalog.previous_gate(ProjectCategory::Standard, GateId::G5), Some(GateId::G4));
    }

    #[test]
    fn development_gate_runs_parallel_roles_with_proofs() {
        let catalog = GateCatalog::builtin();
        let spec = catalog.spec(ProjectCategory::Standard, GateId::G4).unwrap();
        assert_eq!(spec.roles.len(), 2);
        assert!(spec.requires_proof);
        assert!(spec.required_proofs.contains(&ProofType::Runtime));
        assert_eq!(spec.entry_requires, Some(GateId::G3));
    }

    #[test]
    fn acceptance_gate_is_human_only() {
        let catalog = GateCatalog::builtin();
        let spec = catalog.spec(ProjectCategory::Standard, GateId::G9).unwrap();
        assert!(spec.roles.is_empty());
        assert!(spec.deliverables.is_empty());
        assert!(!spec.requires_proof);
    }

    #[test]
    fn release_gate_accepts_any_passing_proof() {
        let catalog = GateCatalog::builtin();
        let spec = catalog.spec(ProjectCategory::Standard, GateId::G7).unwrap();
        assert!(spec.requires_proof);
        assert!(spec.required_proofs.is_empty());
    }

    #[test]
    fn successor_role_walks_within_then_across_gates() {
        let catalog = GateCatalog::builtin();
        assert_eq!(
            catalog.successor_role(ProjectCategory::Standard, GateId::G4, "backend-developer"),
            Some("frontend-developer".to_string())
        );
        assert_eq!(
            catalog.successor_role(ProjectCategory::Standard, GateId::G4, "frontend-developer"),
            Some("qa-engineer".to_string())
        );
        // Last gate with roles: nothing after the acceptance gate.
        assert_eq!(
            catalog.successor_role(ProjectCategory::Standard, GateId::G8, "technical-writer"),
            None
        );
    }

    #[test]
    fn ml_augmented_quality_gate_includes_the_ml_engineer() {
        let catalog = GateCatalog::builtin();
        let spec = catalog.spec(ProjectCategory::MlAugmented, GateId::G5).unwrap();
        assert!(spec.roles.contains(&"ml-engineer".to_string()));
        assert!(spec.deliverables.iter().any(|d| d.name == "evaluation-report"));
    }

    #[test]
    fn invalid_entry_guard_fails_validation() {
        let mut plan = standard_plan();
        for spec in &mut plan.gates {
            if spec.gate_id == GateId::G1 {
                // G1 cannot require a later gate.
                spec.entry_requires = Some(GateId::G4);
            }
        }
        let mut plans = HashMap::new();
        plans.insert(ProjectCategory::Standard, plan);
        let catalog = GateCatalog::new(plans);
        assert!(catalog.validate().is_err());
    }
}
