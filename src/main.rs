//! Tactician CLI entry point.

use anyhow::Result;
use clap::Parser;

use tactician::cli::{commands, Cli, Commands};
use tactician::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _logger = match init_logging(&cli) {
        Ok(logger) => logger,
        Err(err) => tactician::cli::handle_error(err, cli.json),
    };

    let result = match &cli.command {
        Commands::Status { agent, limit } => {
            commands::status::execute(agent, *limit, &cli.dir, cli.json).await
        }
        Commands::Agents => commands::agents::execute(&cli.dir, cli.json).await,
        Commands::Config(command) => commands::config::execute(command, &cli.dir, cli.json),
    };

    if let Err(err) = result {
        tactician::cli::handle_error(err, cli.json);
    }
}

fn init_logging(cli: &Cli) -> Result<LoggerImpl> {
    let config = commands::load_config(&cli.dir)?;
    let log_config = LogConfig::from_settings(&config.logging)?;
    LoggerImpl::init(&log_config)
}
