//! HTTP ingress handlers for the two webhook endpoints (§4.7, §6).
//!
//! Both handlers follow the same shape: verify the webhook's authenticity,
//! resolve just enough identity to build the clients a sync needs, spawn a
//! background dispatch, and return before any of the dispatch work runs
//! (§5 request lifecycle).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use hubcast_core::{DestinationClient, GitCredentials, RawConfigFetcher, SourceForgeClient};
use tracing::{info, instrument, warn};

use crate::config::SourceForgeKind;
use crate::router_wiring::{build_destination_router, build_source_router};
use crate::state::AppState;
use crate::sync_context::SyncContext;

fn lower_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers.iter().map(|(k, v)| (k.as_str().to_lowercase(), v.to_str().unwrap_or("").to_string())).collect()
}

/// `POST /v1/events/src/{github|gitlab}` (§4.7 source handler, §6).
#[instrument(skip(state, headers, body), fields(forge = %forge))]
pub async fn handle_source_webhook(
    State(state): State<AppState>,
    Path(forge): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header_map = lower_headers(&headers);

    let event = match (state.config.source_forge, forge.as_str()) {
        (SourceForgeKind::Github, "github") => {
            let Some(secret) = &state.config.gh_secret else {
                return StatusCode::INTERNAL_SERVER_ERROR;
            };
            hubcast_github::construct_event(&header_map, &body, secret.expose()).map_err(|e| e.to_string())
        }
        (SourceForgeKind::Gitlab, "gitlab") => {
            let Some(secret) = &state.config.gl_secret else {
                return StatusCode::INTERNAL_SERVER_ERROR;
            };
            hubcast_gitlab::construct_event(&header_map, &body, secret.expose()).map_err(|e| e.to_string())
        }
        _ => {
            warn!(forge = %forge, "webhook posted for a forge this instance is not configured as source for");
            return StatusCode::NOT_FOUND;
        }
    };

    let event = match event {
        Ok(event) => event,
        Err(message) => {
            warn!(error = %message, "source event construction failed");
            state.metrics.record_webhook(&forge, "rejected_signature");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let sender = match state.config.source_forge {
        SourceForgeKind::Github => hubcast_github::sender_login(&event),
        SourceForgeKind::Gitlab => hubcast_gitlab::sender_login(&event),
    };
    let Some(sender) = sender else {
        state.metrics.record_webhook(&forge, "benign_skipped");
        return StatusCode::OK;
    };

    let Some(dest_username) = state.account_map.lookup(&sender).await else {
        info!(sender = %sender, "sender is not present in the account map, skipping");
        state.metrics.record_webhook(&forge, "benign_skipped");
        return StatusCode::OK;
    };

    let repository = match state.config.source_forge {
        SourceForgeKind::Github => hubcast_github::source_repository(&event),
        SourceForgeKind::Gitlab => hubcast_gitlab::source_repository(&event),
    };
    let Some((owner, name)) = repository else {
        state.metrics.record_webhook(&forge, "benign_skipped");
        return StatusCode::OK;
    };

    let ctx = match build_source_sync_context(&state, &owner, &name, &dest_username).await {
        Ok(ctx) => ctx,
        Err(message) => {
            warn!(error = %message, owner = %owner, name = %name, "failed to construct clients for the source sync context");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    state.metrics.record_webhook(&forge, "accepted");
    let router = build_source_router(ctx);
    state
        .spawn_sync(async move {
            router.dispatch(&event).await;
        })
        .await;

    StatusCode::OK
}

async fn build_source_sync_context(
    state: &AppState,
    owner: &str,
    name: &str,
    dest_username: &str,
) -> Result<SyncContext, String> {
    let callback_base_url = state.config.gl_callback_url.clone().unwrap_or_default();

    let (source, source_raw_fetcher, source_git_base_url, source_fetch_credentials): (
        Arc<dyn SourceForgeClient>,
        Arc<dyn RawConfigFetcher>,
        String,
        Option<GitCredentials>,
    ) = match state.config.source_forge {
        SourceForgeKind::Github => {
            let auth = state
                .github_auth
                .as_ref()
                .ok_or_else(|| "github source client requested but no github authenticator is configured".to_string())?;
            let token = auth.authenticate_installation(owner, name).await.map_err(|e| e.to_string())?;
            let client = Arc::new(state.github_source_client(owner, name).await.map_err(|e| e.to_string())?);
            let credentials = GitCredentials::new("x-access-token", token);
            (client.clone(), client, "https://github.com".to_string(), Some(credentials))
        }
        SourceForgeKind::Gitlab => {
            let client = Arc::new(state.gitlab_client_for(owner, name, dest_username).await.map_err(|e| e.to_string())?);
            let credentials = GitCredentials::new(dest_username, client.token().to_string());
            let base_url = state.gitlab_auth.instance_url().to_string();
            (client.clone(), client, base_url, Some(credentials))
        }
    };

    let destination: Arc<dyn DestinationClient> = Arc::new(state.gitlab_client_for(owner, name, dest_username).await.map_err(|e| e.to_string())?);

    Ok(SyncContext {
        source,
        source_raw_fetcher,
        destination,
        git_wire: state.git_wire.clone(),
        repo_config_resolver: state.repo_config_resolver.clone(),
        metrics: state.metrics.clone(),
        source_kind: state.config.source_forge,
        source_git_base_url,
        source_fetch_credentials,
        callback_base_url,
    })
}

#[derive(serde::Deserialize)]
pub struct DestinationCallbackQuery {
    src_service: String,
    src_owner: Option<String>,
    src_repo_name: Option<String>,
    src_repo_id: Option<String>,
    src_check_name: String,
}

/// `POST /v1/events/dest/gitlab` (§4.7 destination handler, §6).
#[instrument(skip(state, headers, body, query))]
pub async fn handle_destination_webhook(
    State(state): State<AppState>,
    Query(query): Query<DestinationCallbackQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header_map = lower_headers(&headers);

    let Some(secret) = &state.config.gl_secret else {
        return StatusCode::INTERNAL_SERVER_ERROR;
    };
    let event = match hubcast_gitlab::construct_event(&header_map, &body, secret.expose()) {
        Ok(event) => event,
        Err(message) => {
            warn!(error = %message, "destination event construction failed");
            state.metrics.record_webhook("gitlab", "rejected_signature");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let Some((owner, name)) = parse_destination_repository(&query) else {
        warn!(src_service = %query.src_service, "malformed callback query parameters");
        return StatusCode::INTERNAL_SERVER_ERROR;
    };

    let ctx = match build_destination_sync_context(&state, &query.src_service, &owner, &name).await {
        Ok(ctx) => ctx,
        Err(message) => {
            warn!(error = %message, owner = %owner, name = %name, "failed to construct clients for the destination sync context");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    state.metrics.record_webhook("gitlab", "accepted");
    let router = build_destination_router(ctx, query.src_check_name);
    state
        .spawn_sync(async move {
            router.dispatch(&event).await;
        })
        .await;

    StatusCode::OK
}

/// Resolve the `(owner, name)` of the source repository a destination
/// callback concerns, from the `src_service` / `src_owner`+`src_repo_name`
/// (GitHub) or `src_repo_id` (GitLab, `"namespace/project"`) query
/// parameters the callback URL was registered with (§4.7, §6).
fn parse_destination_repository(query: &DestinationCallbackQuery) -> Option<(String, String)> {
    match query.src_service.as_str() {
        "github" => query.src_owner.clone().zip(query.src_repo_name.clone()),
        "gitlab" => query.src_repo_id.as_deref().and_then(|id| id.rsplit_once('/')).map(|(o, n)| (o.to_string(), n.to_string())),
        _ => None,
    }
}

async fn build_destination_sync_context(
    state: &AppState,
    src_service: &str,
    owner: &str,
    name: &str,
) -> Result<SyncContext, String> {
    let source_kind = match src_service {
        "github" => SourceForgeKind::Github,
        "gitlab" => SourceForgeKind::Gitlab,
        other => return Err(format!("unknown src_service '{other}'")),
    };

    let source: Arc<dyn SourceForgeClient> = match source_kind {
        SourceForgeKind::Github => Arc::new(state.github_source_client(owner, name).await.map_err(|e| e.to_string())?),
        SourceForgeKind::Gitlab => Arc::new(state.gitlab_admin_client(owner, name).map_err(|e| e.to_string())?),
    };
    let source_raw_fetcher: Arc<dyn RawConfigFetcher> = match source_kind {
        SourceForgeKind::Github => Arc::new(state.github_source_client(owner, name).await.map_err(|e| e.to_string())?),
        SourceForgeKind::Gitlab => Arc::new(state.gitlab_admin_client(owner, name).map_err(|e| e.to_string())?),
    };
    let destination: Arc<dyn DestinationClient> = Arc::new(state.gitlab_admin_client(owner, name).map_err(|e| e.to_string())?);

    Ok(SyncContext {
        source,
        source_raw_fetcher,
        destination,
        git_wire: state.git_wire.clone(),
        repo_config_resolver: state.repo_config_resolver.clone(),
        metrics: state.metrics.clone(),
        source_kind,
        source_git_base_url: String::new(),
        source_fetch_credentials: None,
        callback_base_url: state.config.gl_callback_url.clone().unwrap_or_default(),
    })
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod tests;
