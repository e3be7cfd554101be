//! # Hubcast CLI
//!
//! Command-line interface for the Hubcast service: starting it, validating
//! configuration, and printing the webhook routing table (§10.6).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hubcast_service::config::{ConfigError, ServiceConfig};
use hubcast_service::router_wiring::{destination_route_table, source_route_table};
use hubcast_service::start_server;
use tracing::{error, info};

/// Hubcast CLI - mirrors source-forge activity onto a destination GitLab instance
#[derive(Parser)]
#[command(name = "hubcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Event-driven bridge from a source forge to a destination GitLab instance")]
pub struct Cli {
    /// Configuration file path (layered under `HC_*` environment variables)
    #[arg(short, long, env = "HC_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute; defaults to `serve` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands (§10.6)
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP service (the default command)
    Serve,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Routing table commands
    Routes {
        #[command(subcommand)]
        action: RoutesCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load and validate configuration, printing a summary with secrets redacted
    Validate,
}

#[derive(Subcommand)]
pub enum RoutesCommands {
    /// Print the source/destination event routing table without starting the listener
    Print,
}

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("service error: {0}")]
    Service(#[from] hubcast_service::error::ServiceError),
}

/// Main CLI entry point (§10.6).
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => execute_serve(cli.config.as_deref()).await,
        Commands::Config { action: ConfigCommands::Validate } => execute_config_validate(cli.config.as_deref()),
        Commands::Routes { action: RoutesCommands::Print } => execute_routes_print(cli.config.as_deref()),
    }
}

async fn execute_serve(config_path: Option<&std::path::Path>) -> Result<(), CliError> {
    let config = ServiceConfig::load(config_path)?;
    info!(port = config.port, source_forge = config.source_forge.as_str(), "starting hubcast service");
    start_server(config).await?;
    Ok(())
}

fn execute_config_validate(config_path: Option<&std::path::Path>) -> Result<(), CliError> {
    match ServiceConfig::load(config_path) {
        Ok(config) => {
            println!("configuration is valid");
            println!("  port: {}", config.port);
            println!("  source_forge: {}", config.source_forge.as_str());
            println!("  account_map_type: {:?}", config.account_map_type);
            println!("  gl_url: {}", config.gl_url.as_deref().unwrap_or(""));
            println!("  gh_app_identifier: {}", config.gh_app_identifier.as_deref().unwrap_or("(unset)"));
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "configuration is invalid");
            Err(e.into())
        }
    }
}

fn execute_routes_print(config_path: Option<&std::path::Path>) -> Result<(), CliError> {
    let config = ServiceConfig::load(config_path)?;

    println!("source router ({}):", config.source_forge.as_str());
    for kind in source_route_table(config.source_forge) {
        println!("  {kind}");
    }

    println!("destination router (gitlab):");
    for kind in destination_route_table() {
        println!("  {kind}");
    }

    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
