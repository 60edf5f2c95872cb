//! Mock agent executor for testing.
//!
//! Supports a default outcome, per-role overrides, and per-role queues of
//! scripted outcomes for exercising retry sequences. Every invocation is
//! recorded so tests can assert how often a role ran and what it was asked.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{AgentExecutor, AgentOutcome};

/// Outcome configuration for one scripted invocation.
#[derive(Debug, Clone)]
pub struct ScriptedOutcome {
    pub content: String,
    pub fail: bool,
    pub error_message: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Extra latency to simulate a slow agent.
    pub delay_ms: u64,
}

impl Default for ScriptedOutcome {
    fn default() -> Self {
        Self {
            content: "Mock agent run completed.".to_string(),
            fail: false,
            error_message: None,
            input_tokens: 100,
            output_tokens: 50,
            delay_ms: 0,
        }
    }
}

impl ScriptedOutcome {
    pub fn success(content: impl Into<String>) -> Self {
        Self { content: content.into(), ..Default::default() }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            fail: true,
            error_message: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_tokens(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    fn into_outcome(self) -> AgentOutcome {
        if self.fail {
            AgentOutcome::failure(self.error_message.unwrap_or_else(|| "Mock failure".to_string()))
                .with_tokens(self.input_tokens, self.output_tokens)
        } else {
            AgentOutcome::success(self.content).with_tokens(self.input_tokens, self.output_tokens)
        }
    }
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub role: String,
    pub prompt: String,
}

/// Mock executor for tests.
///
/// Resolution order per call: queued outcomes for the role first, then the
/// role override, then the default outcome.
pub struct MockAgentExecutor {
    default_outcome: ScriptedOutcome,
    overrides: Arc<RwLock<HashMap<String, ScriptedOutcome>>>,
    queues: Arc<RwLock<HashMap<String, Vec<ScriptedOutcome>>>>,
    call_counts: Arc<RwLock<HashMap<String, u64>>>,
    calls: Arc<RwLock<Vec<RecordedCall>>>,
}

impl MockAgentExecutor {
    pub fn new() -> Self {
        Self::with_default_outcome(ScriptedOutcome::default())
    }

    pub fn with_default_outcome(outcome: ScriptedOutcome) -> Self {
        Self {
            default_outcome: outcome,
            overrides: Arc::new(RwLock::new(HashMap::new())),
            queues: Arc::new(RwLock::new(HashMap::new())),
            call_counts: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Fixed outcome for every invocation of a role.
    pub async fn set_outcome_for_role(&self, role: &str, outcome: ScriptedOutcome) {
        let mut overrides = self.overrides.write().await;
        overrides.insert(role.to_string(), outcome);
    }

    /// Queue outcomes consumed one per invocation, in order. Once drained,
    /// resolution falls back to the role override or the default.
    pub async fn queue_outcomes_for_role(&self, role: &str, outcomes: Vec<ScriptedOutcome>) {
        let mut queues = self.queues.write().await;
        queues.entry(role.to_string()).or_default().extend(outcomes);
    }

    /// Number of times a role has been invoked.
    pub async fn call_count(&self, role: &str) -> u64 {
        let counts = self.call_counts.read().await;
        counts.get(role).copied().unwrap_or(0)
    }

    pub async fn total_calls(&self) -> u64 {
        let counts = self.call_counts.read().await;
        counts.values().sum()
    }

    /// Every invocation so far, in call order.
    pub async fn transcript(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    async fn next_outcome(&self, role: &str) -> ScriptedOutcome {
        {
            let mut queues = self.queues.write().await;
            if let Some(queue) = queues.get_mut(role) {
                if !queue.is_empty() {
                    return queue.remove(0);
                }
            }
        }

        let overrides = self.overrides.read().await;
        overrides.get(role).cloned().unwrap_or_else(|| self.default_outcome.clone())
    }
}

impl Default for MockAgentExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentExecutor for MockAgentExecutor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(
        &self,
        role: &str,
        _system_context: &str,
        prompt: &str,
    ) -> DomainResult<AgentOutcome> {
        {
            let mut counts = self.call_counts.write().await;
            *counts.entry(role.to_string()).or_insert(0) += 1;
        }
        {
            let mut calls = self.calls.write().await;
            calls.push(RecordedCall { role: role.to_string(), prompt: prompt.to_string() });
        }

        let outcome = self.next_outcome(role).await;
        if outcome.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(outcome.delay_ms)).await;
        }

        Ok(outcome.into_outcome())
    }
}
