//! Hubcast service: HTTP ingress, sync handlers, and process bootstrap
//! (§4, §5, §6).

pub mod config;
pub mod error;
pub mod ingress;
pub mod metrics;
pub mod router_wiring;
pub mod secret;
pub mod state;
pub mod sync_comment;
pub mod sync_context;
pub mod sync_pipeline;
pub mod sync_pull_request;
pub mod sync_push;

#[cfg(test)]
pub mod test_support;

use std::future::IntoFuture;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::metrics::ServiceMetrics;
use crate::state::AppState;

/// How long graceful shutdown waits for in-flight background syncs to
/// drain before giving up on them (§5, §10.2).
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

async fn handle_healthz() -> StatusCode {
    StatusCode::OK
}

async fn handle_readyz(axum::extract::State(state): axum::extract::State<AppState>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn handle_metrics(axum::extract::State(state): axum::extract::State<AppState>) -> (StatusCode, String) {
    match state.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

async fn handle_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

/// Assemble the full router: webhook ingress, health, and metrics routes,
/// layered with tracing, compression, and CORS (§6).
///
/// Scoped to same-origin rather than the model codebase's
/// `CorsLayer::permissive()` — nothing in this service serves a browser
/// client, so there is no cross-origin caller to permit.
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new()
        .route("/v1/events/src/:forge", post(ingress::handle_source_webhook))
        .route("/v1/events/dest/gitlab", post(ingress::handle_destination_webhook));

    let health_routes = Router::new().route("/healthz", get(handle_healthz)).route("/readyz", get(handle_readyz));

    let observability_routes = Router::new().route("/metrics", get(handle_metrics));

    Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(observability_routes)
        .fallback(handle_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::new()),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Bootstrap [`AppState`], bind the listener, and serve until a shutdown
/// signal arrives, draining in-flight background syncs before returning
/// (§5, §10.2).
pub async fn start_server(config: ServiceConfig) -> Result<(), ServiceError> {
    let metrics = ServiceMetrics::new().map_err(|e| ServiceError::ServerFailed { message: e.to_string() })?;
    let address = format!("0.0.0.0:{}", config.port);

    let state = AppState::new(config, metrics)?;
    let app = create_router(state.clone());

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed { address: address.clone(), message: e.to_string() })?;

    info!(address = %address, "hubcast service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future()
        .await
        .map_err(|e| ServiceError::ServerFailed { message: e.to_string() })?;

    info!("draining in-flight background syncs");
    state.drain_background_tasks(SHUTDOWN_DRAIN_TIMEOUT).await;

    Ok(())
}
