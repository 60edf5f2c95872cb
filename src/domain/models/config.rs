//! Runtime configuration models.

use serde::{Deserialize, Serialize};

/// Main configuration structure for gatehouse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Gate orchestration configuration
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Self-healing retry loop configuration
    #[serde(default)]
    pub self_heal: SelfHealConfig,

    /// Optional YAML file overriding the builtin gate catalog
    #[serde(default)]
    pub catalog_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            self_heal: SelfHealConfig::default(),
            catalog_path: None,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// `SQLite` database URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of database connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite:.gatehouse/gatehouse.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: default_database_url(), max_connections: default_max_connections() }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional log file directory; stdout only when unset
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format(), directory: None }
    }
}

/// Gate orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrchestratorConfig {
    /// Maximum concurrently executing roles within one gate round
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-execution bound; an attempt past it becomes FAILED
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,

    /// Retry budget for re-invoking a failed role
    #[serde(default)]
    pub retry_budget: RetryBudgetConfig,
}

const fn default_max_concurrency() -> usize {
    4
}

const fn default_execution_timeout_secs() -> u64 {
    600
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            execution_timeout_secs: default_execution_timeout_secs(),
            retry_budget: RetryBudgetConfig::default(),
        }
    }
}

/// Budget for automatic re-invocation of a failed role within one gate.
///
/// Only FAILED attempts count against the budget. With no window the count
/// covers the whole life of the gate record, which resets the budget at
/// gate creation and keeps tests deterministic; a window restores the
/// "recent failures only" strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryBudgetConfig {
    /// FAILED attempts per role per gate before auto-retry stops
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,

    /// Only count failures within the last N minutes when set
    #[serde(default)]
    pub window_minutes: Option<i64>,
}

const fn default_max_failed_attempts() -> u32 {
    3
}

impl Default for RetryBudgetConfig {
    fn default() -> Self {
        Self { max_failed_attempts: default_max_failed_attempts(), window_minutes: None }
    }
}

/// Self-healing retry loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SelfHealConfig {
    /// Repair iterations before giving up and escalating
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Roles allowed to self-heal; only code-producing roles make sense
    #[serde(default = "default_allowed_roles")]
    pub allowed_roles: Vec<String>,

    /// How many remaining errors an escalation summary quotes
    #[serde(default = "default_escalation_error_limit")]
    pub escalation_error_limit: usize,
}

const fn default_max_attempts() -> u32 {
    3
}

fn default_allowed_roles() -> Vec<String> {
    vec![
        "backend-developer".to_string(),
        "frontend-developer".to_string(),
        "ml-engineer".to_string(),
        "integration-engineer".to_string(),
    ]
}

const fn default_escalation_error_limit() -> usize {
    3
}

impl Default for SelfHealConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            allowed_roles: default_allowed_roles(),
            escalation_error_limit: default_escalation_error_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.orchestrator.max_concurrency, 4);
        assert_eq!(config.orchestrator.retry_budget.max_failed_attempts, 3);
        assert_eq!(config.orchestrator.retry_budget.window_minutes, None);
        assert_eq!(config.self_heal.max_attempts, 3);
        assert!(config.self_heal.allowed_roles.contains(&"backend-developer".to_string()));
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let yaml = "orchestrator:\n  max_concurrency: 2\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.orchestrator.max_concurrency, 2);
        assert_eq!(config.orchestrator.execution_timeout_secs, 600);
        assert_eq!(config.database.max_connections, 5);
    }
}
