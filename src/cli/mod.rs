//! Command line interface: argument parsing, shared wiring, and output.

pub mod commands;
pub mod context;
pub mod id_resolver;
pub mod output;

use clap::{Parser, Subcommand};

use commands::escalation::EscalationArgs;
use commands::gate::GateArgs;
use commands::init::InitArgs;
use commands::project::ProjectArgs;
use commands::run::RunArgs;
use commands::task::TaskArgs;

/// Gate-driven pipeline orchestrator.
#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the working directory: database, workspace, starter config
    Init(InitArgs),
    /// Create, inspect, and list projects
    Project(ProjectArgs),
    /// Inspect and decide gates
    Gate(GateArgs),
    /// Inspect decomposed tasks
    Task(TaskArgs),
    /// List and resolve escalations
    Escalation(EscalationArgs),
    /// Drive a project forward until it needs a human
    Run(RunArgs),
}

/// Print a failure the way the output mode expects and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) {
    if json_mode {
        let value = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
