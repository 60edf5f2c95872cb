//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading (.gatehouse/config.yaml, .gatehouse/local.yaml)
//! - Environment variable overrides (GATEHOUSE_* with __ nesting)
//! - Configuration validation

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
