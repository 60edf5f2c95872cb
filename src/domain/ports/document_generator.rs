//! Port for the external document generator.
//!
//! The core feeds agent output through this and consumes only the document
//! names as a completeness signal; content is opaque.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;

#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate_from_output(
        &self,
        project_id: Uuid,
        role: &str,
        output: &str,
    ) -> DomainResult<Vec<String>>;
}

/// Default generator for deployments without a document pipeline.
#[derive(Debug, Default, Clone)]
pub struct NullDocumentGenerator;

#[async_trait]
impl DocumentGenerator for NullDocumentGenerator {
    async fn generate_from_output(
        &self,
        _project_id: Uuid,
        _role: &str,
        _output: &str,
    ) -> DomainResult<Vec<String>> {
        Ok(Vec::new())
    }
}
