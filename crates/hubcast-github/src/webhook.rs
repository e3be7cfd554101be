//! GitHub webhook signature verification and [`Event`] construction (§4.7 step 1, §6).

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use hubcast_core::{Event, EventKind};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum GitHubWebhookError {
    #[error("missing required header: {header}")]
    MissingHeader { header: String },

    #[error("signature header is not valid hex")]
    InvalidSignatureEncoding,

    #[error("HMAC-SHA256 signature does not match")]
    SignatureMismatch,

    #[error("payload is not valid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl GitHubWebhookError {
    pub fn error_category(&self) -> hubcast_core::ErrorCategory {
        hubcast_core::ErrorCategory::InvalidInput
    }
}

/// Verify `X-Hub-Signature-256` against `secret` in constant time (§4.7).
pub fn verify_signature(secret: &str, body: &[u8], signature_header: &str) -> Result<(), GitHubWebhookError> {
    let hex_part = signature_header.strip_prefix("sha256=").unwrap_or(signature_header);
    let provided = hex::decode(hex_part).map_err(|_| GitHubWebhookError::InvalidSignatureEncoding)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    if expected.as_slice().ct_eq(&provided).unwrap_u8() == 1 {
        Ok(())
    } else {
        Err(GitHubWebhookError::SignatureMismatch)
    }
}

/// Construct a signature-verified [`Event`] from lower-cased request headers
/// and the raw body (§4.7 source ingress, step 1).
pub fn construct_event(headers: &HashMap<String, String>, body: &[u8], secret: &str) -> Result<Event, GitHubWebhookError> {
    let event_type = headers
        .get("x-github-event")
        .ok_or_else(|| GitHubWebhookError::MissingHeader { header: "X-GitHub-Event".to_string() })?;
    let delivery_id = headers
        .get("x-github-delivery")
        .ok_or_else(|| GitHubWebhookError::MissingHeader { header: "X-GitHub-Delivery".to_string() })?;
    let signature = headers
        .get("x-hub-signature-256")
        .ok_or_else(|| GitHubWebhookError::MissingHeader { header: "X-Hub-Signature-256".to_string() })?;

    verify_signature(secret, body, signature)?;

    let payload: Value = serde_json::from_slice(body).map_err(|source| GitHubWebhookError::InvalidJson { source })?;
    Ok(Event::new(EventKind::new(event_type.clone()), delivery_id.clone(), payload))
}

/// The `sender.login` used for the account-map lookup (§4.7 step 2).
pub fn sender_login(event: &Event) -> Option<String> {
    event.field_path(&["sender", "login"]).and_then(Value::as_str).map(str::to_string)
}

/// The `(owner, name)` of the source repository from `repository.full_name`.
pub fn source_repository(event: &Event) -> Option<(String, String)> {
    let full_name = event.field_path(&["repository", "full_name"])?.as_str()?;
    full_name.split_once('/').map(|(o, n)| (o.to_string(), n.to_string()))
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
