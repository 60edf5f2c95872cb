//! Gatehouse CLI entry point.

use clap::Parser;

use gatehouse::cli::{Cli, Commands};
use gatehouse::infrastructure::logging::Logger;
use gatehouse::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Missing config files fall back to defaults, so logging comes up even
    // before `gatehouse init` has run.
    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(err) => {
            gatehouse::cli::handle_error(err, cli.json);
            return;
        }
    };
    let _logger = match Logger::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => {
            gatehouse::cli::handle_error(err, cli.json);
            return;
        }
    };

    let result = match cli.command {
        Commands::Init(args) => gatehouse::cli::commands::init::execute(args, cli.json).await,
        Commands::Project(args) => gatehouse::cli::commands::project::execute(args, cli.json).await,
        Commands::Gate(args) => gatehouse::cli::commands::gate::execute(args, cli.json).await,
        Commands::Task(args) => gatehouse::cli::commands::task::execute(args, cli.json).await,
        Commands::Escalation(args) => {
            gatehouse::cli::commands::escalation::execute(args, cli.json).await
        }
        Commands::Run(args) => gatehouse::cli::commands::run::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        gatehouse::cli::handle_error(err, cli.json);
    }
}
