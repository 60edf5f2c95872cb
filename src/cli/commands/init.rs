//! Implementation of the `gatehouse init` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};

const STARTER_CONFIG: &str = "\
# Gatehouse configuration. Values here override the builtin defaults;
# environment variables prefixed GATEHOUSE_ override both.
database:
  url: sqlite:.gatehouse/gatehouse.db
  max_connections: 5
logging:
  level: info
  format: pretty
  # directory: .gatehouse/logs
orchestrator:
  max_concurrency: 4
  execution_timeout_secs: 600
  retry_budget:
    max_failed_attempts: 3
    # window_minutes: 60
self_heal:
  max_attempts: 3
# catalog_path: .gatehouse/catalog.yaml
";

/// Arguments for `gatehouse init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
struct InitOutput {
    success: bool,
    message: String,
    initialized_path: PathBuf,
    directories_created: Vec<String>,
    database_initialized: bool,
    config_written: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.directories_created.is_empty() {
            lines.push("\nCreated directories:".to_string());
            for dir in &self.directories_created {
                lines.push(format!("  - {dir}"));
            }
        }
        if self.database_initialized {
            lines.push("\nDatabase initialized at .gatehouse/gatehouse.db".to_string());
        }
        if self.config_written {
            lines.push("Wrote starter configuration to .gatehouse/config.yaml".to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Create the `.gatehouse` directory tree, database, and starter config.
pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir().context("Failed to get current directory")?.join(&args.path)
    };

    let gatehouse_dir = target_path.join(".gatehouse");

    if gatehouse_dir.exists() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: target_path,
            directories_created: vec![],
            database_initialized: false,
            config_written: false,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    if args.force && gatehouse_dir.exists() {
        fs::remove_dir_all(&gatehouse_dir)
            .await
            .context("Failed to remove existing .gatehouse directory")?;
    }

    let mut directories_created = vec![];
    let dirs =
        [gatehouse_dir.clone(), gatehouse_dir.join("workspace"), gatehouse_dir.join("logs")];
    for dir in &dirs {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let relative =
                dir.strip_prefix(&target_path).unwrap_or(dir).to_string_lossy().to_string();
            directories_created.push(relative);
        }
    }

    let db_path = gatehouse_dir.join("gatehouse.db");
    let db_url = format!("sqlite:{}", db_path.display());
    initialize_database(&db_url).await.context("Failed to initialize database")?;

    let config_path = gatehouse_dir.join("config.yaml");
    let config_written = if config_path.exists() {
        false
    } else {
        fs::write(&config_path, STARTER_CONFIG)
            .await
            .context("Failed to write starter configuration")?;
        true
    };

    let output_data = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path,
        directories_created,
        database_initialized: true,
        config_written,
    };

    output(&output_data, json_mode);
    Ok(())
}
