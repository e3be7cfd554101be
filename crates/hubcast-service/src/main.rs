//! # Hubcast Service
//!
//! Binary entry point for the Hubcast HTTP service: receives source-forge
//! webhooks, mirrors pushes and pull/merge requests onto a destination
//! GitLab instance, and relays pipeline status back to the source (§1).

use std::path::PathBuf;

use hubcast_service::config::ServiceConfig;
use hubcast_service::error::ServiceError;
use hubcast_service::start_server;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "hubcast_service=info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("HC_CONFIG_PATH").ok().map(PathBuf::from);
    let config = ServiceConfig::load(config_path.as_deref())?;

    info!(port = config.port, source_forge = config.source_forge.as_str(), "starting hubcast service");

    if let Err(e) = start_server(config).await {
        error!(error = %e, "hubcast service failed");

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
            ServiceError::AccountMapBootstrap(_) => 4,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}
