//! The GitHub REST client implementing [`SourceForgeClient`] and
//! [`RawConfigFetcher`] (§4.8).

use std::str::FromStr;

use async_trait::async_trait;
use hubcast_core::{
    ForgeError, GitHubCheckStatus, ObjectId, PipelineStatus, PullRequestRef, RawConfigFetcher, RepoConfigError,
    RepoFullName, SourceForgeClient,
};
use reqwest::Client;
use serde_json::{json, Value};

/// A GitHub client scoped to one `(owner, repo)` for the lifetime of a sync,
/// holding an installation token the caller minted via
/// [`crate::auth::GitHubAuthenticator::authenticate_installation`] (§4.8).
pub struct GitHubClient {
    fullname: RepoFullName,
    token: String,
    http: Client,
    requester: String,
    api_root: Option<String>,
}

impl GitHubClient {
    pub fn new(fullname: RepoFullName, token: impl Into<String>, http: Client, requester: impl Into<String>) -> Self {
        Self {
            fullname,
            token: token.into(),
            http,
            requester: requester.into(),
            api_root: None,
        }
    }

    /// Point this client at a different API root than `https://api.github.com`,
    /// e.g. a `wiremock` server standing in for GitHub in integration tests.
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = Some(root.into());
        self
    }

    async fn token(&self) -> Result<String, ForgeError> {
        Ok(self.token.clone())
    }

    fn api_root(&self) -> String {
        self.api_root.clone().unwrap_or_else(|| "https://api.github.com".to_string())
    }

    fn api_base(&self) -> String {
        let (owner, repo) = self.fullname.parts();
        format!("{}/repos/{owner}/{repo}", self.api_root())
    }

    async fn request(&self, method: reqwest::Method, url: &str) -> Result<reqwest::RequestBuilder, ForgeError> {
        let token = self.token().await?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", &self.requester))
    }
}

#[async_trait]
impl RawConfigFetcher for GitHubClient {
    async fn fetch_hubcast_yaml(&self, fullname: &RepoFullName) -> Result<Vec<u8>, RepoConfigError> {
        let (owner, repo) = fullname.parts();
        let url = format!("{}/repos/{owner}/{repo}/contents/.github/hubcast.yml", self.api_root());

        let response = self
            .request(reqwest::Method::GET, &url)
            .await
            .map_err(|e| RepoConfigError::FetchFailed {
                fullname: fullname.to_string(),
                message: e.to_string(),
            })?
            .header("Accept", "application/vnd.github.raw+json")
            .send()
            .await
            .map_err(|e| RepoConfigError::FetchFailed {
                fullname: fullname.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RepoConfigError::FetchFailed {
                fullname: fullname.to_string(),
                message: format!("unexpected status {}", response.status()),
            });
        }

        response.bytes().await.map(|b| b.to_vec()).map_err(|e| RepoConfigError::FetchFailed {
            fullname: fullname.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl SourceForgeClient for GitHubClient {
    fn fullname(&self) -> &RepoFullName {
        &self.fullname
    }

    async fn has_open_pr_for_branch(&self, branch: &str) -> Result<bool, ForgeError> {
        let (owner, _) = self.fullname.parts();
        let url = format!("{}/pulls?state=open&head={owner}:{branch}", self.api_base());

        let response = self
            .request(reqwest::Method::GET, &url)
            .await?
            .send()
            .await
            .map_err(|source| ForgeError::Http { source })?;

        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: url, status: response.status().as_u16() });
        }

        let body: Vec<Value> = response.json().await.map_err(|source| ForgeError::Http { source })?;
        Ok(!body.is_empty())
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequestRef, ForgeError> {
        let url = format!("{}/pulls/{number}", self.api_base());

        let response = self
            .request(reqwest::Method::GET, &url)
            .await?
            .send()
            .await
            .map_err(|source| ForgeError::Http { source })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ForgeError::NotFound { what: format!("pull request #{number}") });
        }
        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: url.clone(), status: response.status().as_u16() });
        }

        let body: Value = response.json().await.map_err(|source| ForgeError::Http { source })?;
        parse_pull_request(&body, number, &url)
    }

    async fn fetch_hubcast_yaml(&self) -> Result<Vec<u8>, ForgeError> {
        RawConfigFetcher::fetch_hubcast_yaml(self, &self.fullname).await.map_err(ForgeError::RepoConfig)
    }

    async fn set_check_status(
        &self,
        sha: &ObjectId,
        check_name: &str,
        status: PipelineStatus,
        target_url: Option<&str>,
    ) -> Result<(), ForgeError> {
        let translated = GitHubCheckStatus::from_pipeline_status(status);
        let existing_id = self.find_check_run_id(sha, check_name).await?;

        let mut body = json!({
            "name": check_name,
            "head_sha": sha.as_hex(),
            "status": translated.status,
        });
        if let Some(conclusion) = translated.conclusion {
            body["conclusion"] = json!(conclusion);
        }
        if let Some(target_url) = target_url {
            body["details_url"] = json!(target_url);
        }

        let url = match existing_id {
            Some(id) => format!("{}/check-runs/{id}", self.api_base()),
            None => format!("{}/check-runs", self.api_base()),
        };
        let method = if existing_id.is_some() { reqwest::Method::PATCH } else { reqwest::Method::POST };

        let response = self.request(method, &url).await?.json(&body).send().await.map_err(|source| ForgeError::Http { source })?;
        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: url, status: response.status().as_u16() });
        }
        Ok(())
    }

    async fn post_comment(&self, issue_number: u64, body: &str) -> Result<(), ForgeError> {
        let url = format!("{}/issues/{issue_number}/comments", self.api_base());
        let response = self
            .request(reqwest::Method::POST, &url)
            .await?
            .json(&json!({ "body": body }))
            .send()
            .await
            .map_err(|source| ForgeError::Http { source })?;

        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: url, status: response.status().as_u16() });
        }
        Ok(())
    }

    async fn add_reaction_thumbsup(&self, comment_id: u64) -> Result<(), ForgeError> {
        let url = format!("{}/issues/comments/{comment_id}/reactions", self.api_base());
        let response = self
            .request(reqwest::Method::POST, &url)
            .await?
            .header("Accept", "application/vnd.github.squirrel-girl-preview+json")
            .json(&json!({ "content": "+1" }))
            .send()
            .await
            .map_err(|source| ForgeError::Http { source })?;

        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: url, status: response.status().as_u16() });
        }
        Ok(())
    }
}

impl GitHubClient {
    /// A completed check is never matched: the caller must POST a fresh
    /// check-run rather than PATCH a terminal one, so a re-run shows up as
    /// its own check (§4.8, S5).
    async fn find_check_run_id(&self, sha: &ObjectId, check_name: &str) -> Result<Option<u64>, ForgeError> {
        let url = format!("{}/commits/{}/check-runs", self.api_base(), sha.as_hex());
        let response = self
            .request(reqwest::Method::GET, &url)
            .await?
            .send()
            .await
            .map_err(|source| ForgeError::Http { source })?;

        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: url, status: response.status().as_u16() });
        }

        let body: Value = response.json().await.map_err(|source| ForgeError::Http { source })?;
        let id = body
            .get("check_runs")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|run| {
                run.get("name").and_then(Value::as_str) == Some(check_name)
                    && run.get("status").and_then(Value::as_str) != Some("completed")
            })
            .and_then(|run| run.get("id"))
            .and_then(Value::as_u64);
        Ok(id)
    }
}

fn parse_pull_request(body: &Value, number: u64, url: &str) -> Result<PullRequestRef, ForgeError> {
    let head = body.get("head").ok_or_else(|| malformed(url, "missing head"))?;
    let base = body.get("base").ok_or_else(|| malformed(url, "missing base"))?;

    let head_sha_str = head.get("sha").and_then(Value::as_str).ok_or_else(|| malformed(url, "missing head.sha"))?;
    let head_sha = ObjectId::from_str(head_sha_str).map_err(|_| malformed(url, "unparseable head.sha"))?;
    let head_ref = head.get("ref").and_then(Value::as_str).ok_or_else(|| malformed(url, "missing head.ref"))?.to_string();

    let head_repo_full_name = head.get("repo").and_then(|r| r.get("full_name")).and_then(Value::as_str);
    let base_repo_full_name = base.get("repo").and_then(|r| r.get("full_name")).and_then(Value::as_str);
    let from_fork = match (head_repo_full_name, base_repo_full_name) {
        (Some(h), Some(b)) => h != b,
        _ => true,
    };
    let head_repo_private = head.get("repo").and_then(|r| r.get("private")).and_then(Value::as_bool).unwrap_or(false);

    // The pack must come from the head repo's own `clone_url` (§4.8): for a
    // fork, `head_sha` does not exist in the base repo's history at all.
    // `head.repo` is null when the fork has since been deleted; fall back to
    // the base repo's identity in that case (the fetch will fail downstream,
    // but parsing the event itself should not).
    let head_repo_fullname = head_repo_full_name
        .or(base_repo_full_name)
        .and_then(|full_name| full_name.split_once('/'))
        .and_then(|(owner, name)| RepoFullName::new(owner, name).ok())
        .ok_or_else(|| malformed(url, "missing head.repo.full_name and base.repo.full_name"))?;

    Ok(PullRequestRef {
        number,
        head_sha,
        head_ref,
        from_fork,
        head_repo_private,
        head_repo_fullname,
        head_repo_clone_url: None,
    })
}

fn malformed(endpoint: &str, message: &str) -> ForgeError {
    ForgeError::UnexpectedStatus { endpoint: format!("{endpoint} ({message})"), status: 0 }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
