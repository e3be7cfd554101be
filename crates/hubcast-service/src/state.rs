//! Process-wide application state: clients, caches, and the background-task
//! tracker shared across every ingress request (§5, §10.2).
//!
//! Per-request clients (the GitHub/GitLab REST clients scoped to one
//! `(owner, repo)` and one impersonated destination user) are *not* stored
//! here — only the long-lived authenticators and caches that mint them are
//! (§4.7 steps 3-4).

use std::sync::Arc;
use std::time::Duration;

use hubcast_core::{AccountMap, FileAccountMap, GitWireClient, HttpGitWireClient, RepoConfigResolver, RepoFullName};
use hubcast_gitlab::{GitLabAuthenticator, GitLabClient};
use hubcast_github::{GitHubAuthenticator, GitHubClient};
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::config::{ServiceConfig, SourceForgeKind};
use crate::error::ServiceError;
use crate::metrics::ServiceMetrics;

/// Outbound HTTP timeouts applied to every `reqwest::Client` this service
/// constructs (§5). Git-wire operations inherit the same client.
const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(30);
const OUTBOUND_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_http_client() -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(OUTBOUND_TIMEOUT)
        .connect_timeout(OUTBOUND_CONNECT_TIMEOUT)
        .build()
        .map_err(|e| ServiceError::ServerFailed { message: format!("failed to build HTTP client: {e}") })
}

/// Shared application state (§5, §10.2). One shared `reqwest::Client` per
/// outbound target (GitHub, GitLab, git-wire) rather than a single client
/// for everything, so a future per-target timeout override doesn't require
/// restructuring call sites.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub metrics: Arc<ServiceMetrics>,
    pub account_map: Arc<dyn AccountMap>,
    pub repo_config_resolver: Arc<RepoConfigResolver>,
    pub git_wire: Arc<dyn GitWireClient>,

    /// Present only when the configured source forge is GitHub (§1, §4.2).
    pub github_auth: Option<Arc<GitHubAuthenticator>>,
    github_http: Client,

    /// Always present: GitLab is always the destination (§1, §4.3), and it
    /// doubles as the source authenticator when GitLab is also the source.
    pub gitlab_auth: Arc<GitLabAuthenticator>,
    gitlab_http: Client,

    /// Tracks background sync tasks spawned per ingress request so graceful
    /// shutdown can drain them with a bounded timeout (§5, §10.2).
    sync_tasks: Arc<Mutex<JoinSet<()>>>,
}

impl AppState {
    pub fn new(config: ServiceConfig, metrics: Arc<ServiceMetrics>) -> Result<Self, ServiceError> {
        let account_map = match config.account_map_type {
            crate::config::AccountMapKind::File => {
                let path = config.account_map_path.as_deref().ok_or(crate::config::ConfigError::Missing {
                    key: "HC_ACCOUNT_MAP_PATH",
                })?;
                Arc::new(FileAccountMap::from_path(path)?) as Arc<dyn AccountMap>
            }
            kind => return Err(crate::config::ConfigError::UnsupportedAccountMapType { kind }.into()),
        };

        let github_http = build_http_client()?;
        let gitlab_http = build_http_client()?;
        let git_wire_http = build_http_client()?;

        let github_auth = if config.source_forge == SourceForgeKind::Github {
            let app_id = config.gh_app_identifier.clone().ok_or(crate::config::ConfigError::Missing {
                key: "HC_GH_APP_IDENTIFIER",
            })?;
            let private_key = config.gh_private_key.clone().ok_or(crate::config::ConfigError::Missing {
                key: "HC_GH_PRIVATE_KEY",
            })?;
            let requester = config.gh_requester.clone().ok_or(crate::config::ConfigError::Missing {
                key: "HC_GH_REQUESTER",
            })?;
            Some(Arc::new(GitHubAuthenticator::new(app_id, private_key.expose().to_string(), requester, github_http.clone())))
        } else {
            None
        };

        let gl_url = config.gl_url.clone().ok_or(crate::config::ConfigError::Missing { key: "HC_GL_URL" })?;
        let gl_token = config.gl_access_token.clone().ok_or(crate::config::ConfigError::Missing {
            key: "HC_GL_ACCESS_TOKEN",
        })?;
        let gl_requester = config.gl_requester.clone().ok_or(crate::config::ConfigError::Missing {
            key: "HC_GL_REQUESTER",
        })?;
        let gitlab_auth =
            Arc::new(GitLabAuthenticator::new(gl_url, gl_token.expose().to_string(), gl_requester, gitlab_http.clone()));

        Ok(Self {
            config: Arc::new(config),
            metrics,
            account_map,
            repo_config_resolver: Arc::new(RepoConfigResolver::new()),
            git_wire: Arc::new(HttpGitWireClient::new(git_wire_http)),
            github_auth,
            github_http,
            gitlab_auth,
            gitlab_http,
            sync_tasks: Arc::new(Mutex::new(JoinSet::new())),
        })
    }

    /// `GET /readyz` additionally checks that the account map loaded and the
    /// git-wire HTTP client is constructed (§10.2) — both are guaranteed by
    /// the time an `AppState` exists, so readiness is unconditional once the
    /// server has started accepting connections.
    pub fn is_ready(&self) -> bool {
        true
    }

    /// Build a GitHub installation-scoped source client for `(owner, name)`
    /// (§4.7 step 3). Requires `source_forge == github`.
    pub async fn github_source_client(&self, owner: &str, name: &str) -> Result<GitHubClient, ServiceError> {
        let auth = self.github_auth.as_ref().ok_or_else(|| ServiceError::ServerFailed {
            message: "github source client requested but source_forge is not github".to_string(),
        })?;
        let token = auth.authenticate_installation(owner, name).await.map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;
        let fullname = RepoFullName::new(owner, name).map_err(|e| ServiceError::ServerFailed { message: e.to_string() })?;
        let requester = self.config.gh_requester.clone().unwrap_or_default();
        Ok(GitHubClient::new(fullname, token, self.github_http.clone(), requester))
    }

    /// Build a GitLab source client for `(namespace, name)` (§4.7 step 3),
    /// impersonating the resolved destination user. Used both when GitLab is
    /// the source forge and, always, for the destination client.
    pub async fn gitlab_client_for(&self, owner: &str, name: &str, dest_username: &str) -> Result<GitLabClient, ServiceError> {
        let token = self.gitlab_auth.authenticate_user(dest_username).await.map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;
        let fullname = RepoFullName::new(owner, name).map_err(|e| ServiceError::ServerFailed { message: e.to_string() })?;
        let requester = self.config.gl_requester.clone().unwrap_or_default();
        Ok(GitLabClient::new(
            fullname,
            self.gitlab_auth.instance_url(),
            token,
            dest_username,
            self.gitlab_http.clone(),
            requester,
        ))
    }

    /// Build a GitLab client authenticated with the admin token directly,
    /// rather than an impersonated user's token (§4.3). Used for the
    /// destination-handler's pipeline-status relay (§4.7), where there is no
    /// webhook sender to resolve a destination identity from, and as the
    /// placeholder `destination` field of a source-ingress `SyncContext`
    /// when GitLab is also the source forge — the same instance credentials
    /// serve both roles, so no separate impersonation is needed to read a
    /// project's commit-status or hook configuration.
    pub fn gitlab_admin_client(&self, owner: &str, name: &str) -> Result<GitLabClient, ServiceError> {
        let token = self.config.gl_access_token.clone().ok_or(crate::config::ConfigError::Missing {
            key: "HC_GL_ACCESS_TOKEN",
        })?;
        let fullname = RepoFullName::new(owner, name).map_err(|e| ServiceError::ServerFailed { message: e.to_string() })?;
        let requester = self.config.gl_requester.clone().unwrap_or_default();
        Ok(GitLabClient::new(
            fullname,
            self.gitlab_auth.instance_url(),
            token.expose().to_string(),
            "",
            self.gitlab_http.clone(),
            requester,
        ))
    }

    /// Spawn a background sync-dispatch task tracked in the shared `JoinSet`
    /// (§5, §10.2) so graceful shutdown can wait for it.
    pub async fn spawn_sync(&self, task: impl std::future::Future<Output = ()> + Send + 'static) {
        self.sync_tasks.lock().await.spawn(task);
    }

    /// Drain outstanding background tasks, waiting at most `timeout` before
    /// giving up on the stragglers (§5, §10.2 graceful shutdown).
    pub async fn drain_background_tasks(&self, timeout: Duration) {
        let mut tasks = self.sync_tasks.lock().await;
        let _ = tokio::time::timeout(timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
