//! Port for the external agent execution capability.
//!
//! The language-model call itself lives behind this trait; the core only
//! sees final content and a success flag.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Final result of one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub content: String,
    pub success: bool,
    pub error: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl AgentOutcome {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            success: true,
            error: None,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            success: false,
            error: Some(error.into()),
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    pub fn with_tokens(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }
}

#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Executor name for logs and attempt summaries.
    fn name(&self) -> &str;

    /// Run one agent invocation to completion. An `Err` means the executor
    /// itself broke; an unsuccessful outcome means the agent gave up.
    async fn execute(
        &self,
        role: &str,
        system_context: &str,
        prompt: &str,
    ) -> DomainResult<AgentOutcome>;
}
