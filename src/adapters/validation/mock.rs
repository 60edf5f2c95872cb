//! Mock validator for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{ValidationReport, Validator};

/// Mock validator that serves queued reports in order, then falls back to
/// a default. Tests script a failure-then-success sequence to drive the
/// repair loop.
pub struct MockValidator {
    default_report: ValidationReport,
    queued: Arc<RwLock<Vec<ValidationReport>>>,
    run_count: Arc<RwLock<u64>>,
}

impl MockValidator {
    pub fn new() -> Self {
        Self::with_default_report(ValidationReport::passing())
    }

    pub fn with_default_report(report: ValidationReport) -> Self {
        Self {
            default_report: report,
            queued: Arc::new(RwLock::new(Vec::new())),
            run_count: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn queue_reports(&self, reports: Vec<ValidationReport>) {
        let mut queued = self.queued.write().await;
        queued.extend(reports);
    }

    pub async fn run_count(&self) -> u64 {
        *self.run_count.read().await
    }
}

impl Default for MockValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for MockValidator {
    async fn run_full_validation(&self, _project_id: Uuid) -> DomainResult<ValidationReport> {
        {
            let mut count = self.run_count.write().await;
            *count += 1;
        }

        let mut queued = self.queued.write().await;
        if queued.is_empty() {
            Ok(self.default_report.clone())
        } else {
            Ok(queued.remove(0))
        }
    }
}
