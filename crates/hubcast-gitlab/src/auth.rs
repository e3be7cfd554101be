//! GitLab impersonation-token authentication against the destination
//! instance (§4.3).

use std::collections::HashMap;

use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;

use hubcast_core::{Timestamp, TokenCache};

#[derive(Debug, thiserror::Error)]
pub enum GitLabAuthError {
    #[error("gitlab api request failed: {source}")]
    Http {
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("no gitlab user found for username {username}")]
    NotFound { username: String },

    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },
}

impl GitLabAuthError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::UnexpectedStatus { .. })
    }

    pub fn error_category(&self) -> hubcast_core::ErrorCategory {
        match self {
            Self::Http { .. } | Self::UnexpectedStatus { .. } => hubcast_core::ErrorCategory::Transient,
            Self::NotFound { .. } | Self::MalformedResponse { .. } => hubcast_core::ErrorCategory::Permanent,
        }
    }
}

/// Default scopes requested for an impersonation token (§4.3).
pub const DEFAULT_SCOPES: &[&str] = &["api", "read_repository", "write_repository"];
const DEFAULT_EXPIRE_DAYS: i64 = 1;

/// Resolves destination users and mints impersonation tokens on their
/// behalf, using an administrator personal access token (§4.3).
pub struct GitLabAuthenticator {
    instance_url: String,
    admin_token: String,
    requester: String,
    http: Client,
    user_ids: Mutex<HashMap<String, u64>>,
    impersonation_tokens: TokenCache,
}

impl GitLabAuthenticator {
    pub fn new(instance_url: impl Into<String>, admin_token: impl Into<String>, requester: impl Into<String>, http: Client) -> Self {
        Self {
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            admin_token: admin_token.into(),
            requester: requester.into(),
            http,
            user_ids: Mutex::new(HashMap::new()),
            impersonation_tokens: TokenCache::new(),
        }
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    async fn resolve_user_id(&self, username: &str) -> Result<u64, GitLabAuthError> {
        if let Some(id) = self.user_ids.lock().await.get(username) {
            return Ok(*id);
        }

        let endpoint = format!("{}/api/v4/users?username={username}", self.instance_url);
        let response = self
            .http
            .get(&endpoint)
            .header("PRIVATE-TOKEN", &self.admin_token)
            .header("User-Agent", &self.requester)
            .send()
            .await
            .map_err(|source| GitLabAuthError::Http { source })?;

        if !response.status().is_success() {
            return Err(GitLabAuthError::UnexpectedStatus { endpoint, status: response.status().as_u16() });
        }

        let body: Vec<Value> = response.json().await.map_err(|source| GitLabAuthError::Http { source })?;
        let id = body
            .first()
            .and_then(|user| user.get("id"))
            .and_then(Value::as_u64)
            .ok_or_else(|| GitLabAuthError::NotFound { username: username.to_string() })?;

        self.user_ids.lock().await.insert(username.to_string(), id);
        Ok(id)
    }

    /// Mint (or return a cached) impersonation token for `username` (§4.3).
    /// Cached under the username, since the token cache key must be stable
    /// across the date-only `expires_at` the impersonation-token API wants.
    pub async fn authenticate_user(&self, username: &str) -> Result<String, GitLabAuthError> {
        let cache_key = format!("impersonation:{username}");
        self.impersonation_tokens
            .get_default(&cache_key, || self.mint_impersonation_token(username))
            .await
    }

    async fn mint_impersonation_token(&self, username: &str) -> Result<(i64, String), GitLabAuthError> {
        let user_id = self.resolve_user_id(username).await?;
        let expires_at = Timestamp::utc_midnight_after(DEFAULT_EXPIRE_DAYS);

        let endpoint = format!("{}/api/v4/users/{user_id}/impersonation_tokens", self.instance_url);
        let response = self
            .http
            .post(&endpoint)
            .header("PRIVATE-TOKEN", &self.admin_token)
            .header("User-Agent", &self.requester)
            .json(&serde_json::json!({
                "name": "hubcast-impersonation",
                "description": format!("Hubcast impersonation token for {username}"),
                "expires_at": expires_at.as_date_string(),
                "scopes": DEFAULT_SCOPES,
            }))
            .send()
            .await
            .map_err(|source| GitLabAuthError::Http { source })?;

        if !response.status().is_success() {
            return Err(GitLabAuthError::UnexpectedStatus { endpoint, status: response.status().as_u16() });
        }

        let body: Value = response.json().await.map_err(|source| GitLabAuthError::Http { source })?;
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| GitLabAuthError::MalformedResponse { endpoint: endpoint.clone(), message: "missing token".to_string() })?
            .to_string();

        Ok((expires_at.epoch_seconds(), token))
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
