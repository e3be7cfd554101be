//! GitHub App authentication: JWT minting, installation resolution, and
//! installation-token exchange (§4.2).

use std::collections::HashMap;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use hubcast_core::{Timestamp, TokenCache};

#[derive(Debug, thiserror::Error)]
pub enum GitHubAuthError {
    #[error("failed to sign app JWT: {message}")]
    JwtSigning { message: String },

    #[error("github api request failed: {source}")]
    Http {
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("no installation found for {owner}/{repo}")]
    InstallationNotFound { owner: String, repo: String },

    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },
}

impl GitHubAuthError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::UnexpectedStatus { .. })
    }

    pub fn error_category(&self) -> hubcast_core::ErrorCategory {
        match self {
            Self::JwtSigning { .. } => hubcast_core::ErrorCategory::Configuration,
            Self::Http { .. } | Self::UnexpectedStatus { .. } => hubcast_core::ErrorCategory::Transient,
            Self::InstallationNotFound { .. } | Self::MalformedResponse { .. } => {
                hubcast_core::ErrorCategory::Permanent
            }
        }
    }
}

#[derive(Serialize)]
struct AppJwtClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// GitHub mandates app JWTs live at most 10 minutes (§4.2).
const JWT_LIFETIME_SECONDS: i64 = 10 * 60;
/// Back-date `iat` slightly to absorb clock drift between us and GitHub.
const JWT_CLOCK_SKEW_SECONDS: i64 = 60;

/// Mints and caches GitHub App JWTs and installation access tokens (§4.2).
pub struct GitHubAuthenticator {
    app_id: String,
    private_key_pem: Vec<u8>,
    requester: String,
    http: Client,
    api_root: Option<String>,
    jwt_cache: TokenCache,
    installation_ids: Mutex<HashMap<(String, String), u64>>,
    installation_tokens: TokenCache,
}

impl GitHubAuthenticator {
    pub fn new(
        app_id: impl Into<String>,
        private_key_pem: impl Into<String>,
        requester: impl Into<String>,
        http: Client,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            private_key_pem: private_key_pem.into().into_bytes(),
            requester: requester.into(),
            http,
            api_root: None,
            jwt_cache: TokenCache::new(),
            installation_ids: Mutex::new(HashMap::new()),
            installation_tokens: TokenCache::new(),
        }
    }

    /// Point this authenticator at a different API root than
    /// `https://api.github.com`, e.g. a `wiremock` server standing in for
    /// GitHub in integration tests.
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = Some(root.into());
        self
    }

    fn api_root(&self) -> String {
        self.api_root.clone().unwrap_or_else(|| "https://api.github.com".to_string())
    }

    /// Returns a cached app JWT, renewing it once it's within 60s of
    /// GitHub's fixed 10-minute lifetime.
    pub async fn get_jwt(&self) -> Result<String, GitHubAuthError> {
        self.jwt_cache.get_default("app-jwt", || self.mint_jwt()).await
    }

    async fn mint_jwt(&self) -> Result<(i64, String), GitHubAuthError> {
        let now = Timestamp::now().epoch_seconds();
        let claims = AppJwtClaims {
            iat: now - JWT_CLOCK_SKEW_SECONDS,
            exp: now + JWT_LIFETIME_SECONDS,
            iss: self.app_id.clone(),
        };

        let encoding_key = EncodingKey::from_rsa_pem(&self.private_key_pem)
            .map_err(|e| GitHubAuthError::JwtSigning { message: e.to_string() })?;
        let token = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| GitHubAuthError::JwtSigning { message: e.to_string() })?;

        Ok((now + JWT_LIFETIME_SECONDS, token))
    }

    /// Resolve and memoize the installation id for `(owner, repo)` (§4.2).
    pub async fn get_installation_id(&self, owner: &str, repo: &str) -> Result<u64, GitHubAuthError> {
        let key = (owner.to_string(), repo.to_string());
        if let Some(id) = self.installation_ids.lock().await.get(&key) {
            return Ok(*id);
        }

        let jwt = self.get_jwt().await?;
        let endpoint = format!("{}/repos/{owner}/{repo}/installation", self.api_root());
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(&jwt)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", &self.requester)
            .send()
            .await
            .map_err(|source| GitHubAuthError::Http { source })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GitHubAuthError::InstallationNotFound {
                owner: owner.to_string(),
                repo: repo.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(GitHubAuthError::UnexpectedStatus {
                endpoint,
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|source| GitHubAuthError::Http { source })?;
        let id = body
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| GitHubAuthError::MalformedResponse {
                endpoint: endpoint.clone(),
                message: "missing installation id".to_string(),
            })?;

        self.installation_ids.lock().await.insert(key, id);
        Ok(id)
    }

    /// Exchange the installation id for a cached installation access token,
    /// shared across repos in the same installation (§4.2).
    pub async fn authenticate_installation(&self, owner: &str, repo: &str) -> Result<String, GitHubAuthError> {
        let installation_id = self.get_installation_id(owner, repo).await?;
        let cache_key = format!("installation:{installation_id}");
        self.installation_tokens
            .get_default(&cache_key, || self.mint_installation_token(installation_id))
            .await
    }

    async fn mint_installation_token(&self, installation_id: u64) -> Result<(i64, String), GitHubAuthError> {
        let jwt = self.get_jwt().await?;
        let endpoint = format!("{}/app/installations/{installation_id}/access_tokens", self.api_root());
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&jwt)
            .header("Accept", "application/vnd.github.machine-man-preview+json")
            .header("User-Agent", &self.requester)
            .send()
            .await
            .map_err(|source| GitHubAuthError::Http { source })?;

        if !response.status().is_success() {
            return Err(GitHubAuthError::UnexpectedStatus {
                endpoint,
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|source| GitHubAuthError::Http { source })?;
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| GitHubAuthError::MalformedResponse {
                endpoint: endpoint.clone(),
                message: "missing token".to_string(),
            })?
            .to_string();
        let expires_at = body
            .get("expires_at")
            .and_then(Value::as_str)
            .ok_or_else(|| GitHubAuthError::MalformedResponse {
                endpoint: endpoint.clone(),
                message: "missing expires_at".to_string(),
            })?;
        let expires_at_epoch = Timestamp::from_github_isotime(expires_at)
            .map_err(|_| GitHubAuthError::MalformedResponse {
                endpoint,
                message: format!("unparseable expires_at: {expires_at}"),
            })?
            .epoch_seconds();

        Ok((expires_at_epoch, token))
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
