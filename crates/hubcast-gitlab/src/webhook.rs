//! GitLab webhook token verification and [`Event`] construction (§4.7 step 1, §6).

use std::collections::HashMap;

use hubcast_core::{Event, EventKind};
use serde_json::Value;
use subtle::ConstantTimeEq;

#[derive(Debug, thiserror::Error)]
pub enum GitLabWebhookError {
    #[error("missing required header: {header}")]
    MissingHeader { header: String },

    #[error("X-Gitlab-Token does not match the configured secret")]
    TokenMismatch,

    #[error("payload is not valid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl GitLabWebhookError {
    pub fn error_category(&self) -> hubcast_core::ErrorCategory {
        hubcast_core::ErrorCategory::InvalidInput
    }
}

/// Verify `X-Gitlab-Token` against `secret` by constant-time string
/// equality. Unlike GitHub, GitLab does not HMAC the body — the header
/// carries the shared secret directly (§6).
pub fn verify_token(secret: &str, provided: &str) -> Result<(), GitLabWebhookError> {
    if secret.as_bytes().ct_eq(provided.as_bytes()).unwrap_u8() == 1 {
        Ok(())
    } else {
        Err(GitLabWebhookError::TokenMismatch)
    }
}

/// Construct a verified [`Event`] from lower-cased request headers and the
/// raw body (§4.7 source/destination ingress, step 1).
pub fn construct_event(headers: &HashMap<String, String>, body: &[u8], secret: &str) -> Result<Event, GitLabWebhookError> {
    let event_type = headers
        .get("x-gitlab-event")
        .ok_or_else(|| GitLabWebhookError::MissingHeader { header: "X-Gitlab-Event".to_string() })?;
    let token = headers
        .get("x-gitlab-token")
        .ok_or_else(|| GitLabWebhookError::MissingHeader { header: "X-Gitlab-Token".to_string() })?;

    verify_token(secret, token)?;

    let payload: Value = serde_json::from_slice(body).map_err(|source| GitLabWebhookError::InvalidJson { source })?;
    // GitLab delivers no equivalent of GitHub's X-GitHub-Delivery header;
    // a stable per-event id isn't needed for correctness so we derive one.
    let delivery_id = payload
        .get("object_attributes")
        .and_then(|oa| oa.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(Event::new(EventKind::new(event_type.clone()), delivery_id, payload))
}

/// The sender username from either `user.username` (Merge Request / Note
/// hooks) or `user_username` (Push hook), used for the account-map lookup
/// (§4.7 step 2).
pub fn sender_login(event: &Event) -> Option<String> {
    event
        .field_path(&["user", "username"])
        .and_then(Value::as_str)
        .or_else(|| event.field_path(&["user_username"]).and_then(Value::as_str))
        .map(str::to_string)
}

/// The `(namespace, name)` of the source project from `project.path_with_namespace`.
pub fn source_repository(event: &Event) -> Option<(String, String)> {
    let full_path = event.field_path(&["project", "path_with_namespace"])?.as_str()?;
    full_path.rsplit_once('/').map(|(namespace, name)| (namespace.to_string(), name.to_string()))
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
