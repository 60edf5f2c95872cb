//! Hierarchical configuration loading.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database URL cannot be empty")]
    EmptyDatabaseUrl,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid orchestrator.max_concurrency: {0}. Must be at least 1")]
    InvalidMaxConcurrency(usize),

    #[error("Invalid orchestrator.execution_timeout_secs: {0}. Must be positive")]
    InvalidExecutionTimeout(u64),

    #[error("Invalid self_heal.max_attempts: {0}. Must be at least 1")]
    InvalidMaxAttempts(u32),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .gatehouse/config.yaml (project config, created by init)
    /// 3. .gatehouse/local.yaml (local overrides, optional)
    /// 4. Environment variables (GATEHOUSE_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.gatehouse/) so one
    /// machine can host several pipelines with different settings.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".gatehouse/config.yaml"))
            .merge(Yaml::file(".gatehouse/local.yaml"))
            .merge(Env::prefixed("GATEHOUSE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.orchestrator.max_concurrency == 0 {
            return Err(ConfigError::InvalidMaxConcurrency(config.orchestrator.max_concurrency));
        }
        if config.orchestrator.execution_timeout_secs == 0 {
            return Err(ConfigError::InvalidExecutionTimeout(
                config.orchestrator.execution_timeout_secs,
            ));
        }
        if config.orchestrator.retry_budget.max_failed_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "orchestrator.retry_budget.max_failed_attempts cannot be 0".to_string(),
            ));
        }
        if let Some(minutes) = config.orchestrator.retry_budget.window_minutes {
            if minutes <= 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "orchestrator.retry_budget.window_minutes must be positive, got {minutes}"
                )));
            }
        }

        if config.self_heal.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.self_heal.max_attempts));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.database.url, "sqlite:.gatehouse/gatehouse.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.orchestrator.max_concurrency, 4);
        assert_eq!(config.self_heal.max_attempts, 3);
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn yaml_covers_every_section() {
        let yaml = r"
database:
  url: sqlite:/tmp/custom.db
  max_connections: 2
logging:
  level: debug
  format: json
orchestrator:
  max_concurrency: 8
  execution_timeout_secs: 120
  retry_budget:
    max_failed_attempts: 5
    window_minutes: 30
self_heal:
  max_attempts: 2
  allowed_roles: [backend-developer]
catalog_path: .gatehouse/catalog.yaml
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.url, "sqlite:/tmp/custom.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.orchestrator.max_concurrency, 8);
        assert_eq!(config.orchestrator.execution_timeout_secs, 120);
        assert_eq!(config.orchestrator.retry_budget.max_failed_attempts, 5);
        assert_eq!(config.orchestrator.retry_budget.window_minutes, Some(30));
        assert_eq!(config.self_heal.max_attempts, 2);
        assert_eq!(config.self_heal.allowed_roles, vec!["backend-developer"]);
        assert_eq!(config.catalog_path.as_deref(), Some(".gatehouse/catalog.yaml"));

        ConfigLoader::validate(&config).expect("parsed config should be valid");
    }

    #[test]
    fn rejects_bad_log_settings() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogLevel(_)
        ));

        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn rejects_empty_database_url() {
        let mut config = Config::default();
        config.database.url = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyDatabaseUrl
        ));
    }

    #[test]
    fn rejects_zero_bounds() {
        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConnections(0)
        ));

        let mut config = Config::default();
        config.orchestrator.max_concurrency = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConcurrency(0)
        ));

        let mut config = Config::default();
        config.orchestrator.execution_timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidExecutionTimeout(0)
        ));

        let mut config = Config::default();
        config.self_heal.max_attempts = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxAttempts(0)
        ));
    }

    #[test]
    fn rejects_nonpositive_retry_window() {
        let mut config = Config::default();
        config.orchestrator.retry_budget.window_minutes = Some(0);
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ValidationFailed(_)
        ));
    }

    #[test]
    fn later_files_override_earlier_ones() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "logging:\n  level: info\n  format: json").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "logging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.logging.level, "debug", "override should win");
        assert_eq!(config.logging.format, "json", "base value should persist");
    }

    #[test]
    fn environment_variables_override_defaults() {
        temp_env::with_vars(
            [
                ("GATEHOUSE_LOGGING__LEVEL", Some("debug")),
                ("GATEHOUSE_ORCHESTRATOR__MAX_CONCURRENCY", Some("8")),
                ("GATEHOUSE_DATABASE__URL", Some("sqlite::memory:")),
            ],
            || {
                let config: Config = Figment::new()
                    .merge(Serialized::defaults(Config::default()))
                    .merge(Env::prefixed("GATEHOUSE_").split("__"))
                    .extract()
                    .unwrap();
                assert_eq!(config.logging.level, "debug");
                assert_eq!(config.orchestrator.max_concurrency, 8);
                assert_eq!(config.database.url, "sqlite::memory:");
            },
        );
    }
}
