//! Port for the external validation capability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;

/// Outcome of a full validation pass over a project's working area.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub overall_success: bool,
    pub build_errors: Vec<String>,
    pub lint_errors: Vec<String>,
    pub test_errors: Vec<String>,
}

impl ValidationReport {
    pub fn passing() -> Self {
        Self { overall_success: true, ..Self::default() }
    }

    pub fn failing(build_errors: Vec<String>) -> Self {
        Self { overall_success: false, build_errors, ..Self::default() }
    }

    /// All errors flattened in build, lint, test order.
    pub fn all_errors(&self) -> Vec<String> {
        self.build_errors
            .iter()
            .chain(self.lint_errors.iter())
            .chain(self.test_errors.iter())
            .cloned()
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.build_errors.len() + self.lint_errors.len() + self.test_errors.len()
    }

    pub fn is_clean(&self) -> bool {
        self.overall_success && self.error_count() == 0
    }
}

#[async_trait]
pub trait Validator: Send + Sync {
    async fn run_full_validation(&self, project_id: Uuid) -> DomainResult<ValidationReport>;
}
