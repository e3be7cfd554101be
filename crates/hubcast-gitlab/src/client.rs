//! The GitLab REST client implementing [`SourceForgeClient`],
//! [`DestinationClient`], and [`RawConfigFetcher`] (§4.8).

use std::str::FromStr;

use async_trait::async_trait;
use hubcast_core::{
    DestinationClient, ForgeError, ObjectId, PipelineStatus, PullRequestRef, RawConfigFetcher, RepoConfigError,
    RepoFullName, SourceForgeClient,
};
use reqwest::Client;
use serde_json::{json, Value};

/// URL-encode a `owner/name` project identifier for GitLab's `:id` path
/// parameter, which accepts either a numeric id or the encoded full path.
fn encoded_project_id(fullname: &RepoFullName) -> String {
    fullname.as_str().replace('/', "%2F")
}

/// A GitLab client scoped to one project for the lifetime of a sync,
/// holding an impersonation token minted for the resolved destination user
/// (§4.3, §4.8).
pub struct GitLabClient {
    fullname: RepoFullName,
    instance_url: String,
    token: String,
    username: String,
    http: Client,
    requester: String,
}

impl GitLabClient {
    pub fn new(
        fullname: RepoFullName,
        instance_url: impl Into<String>,
        token: impl Into<String>,
        username: impl Into<String>,
        http: Client,
        requester: impl Into<String>,
    ) -> Self {
        Self {
            fullname,
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            username: username.into(),
            http,
            requester: requester.into(),
        }
    }

    fn api_root(&self) -> String {
        format!("{}/api/v4", self.instance_url)
    }

    fn project_url(&self, fullname: &RepoFullName) -> String {
        format!("{}/projects/{}", self.api_root(), encoded_project_id(fullname))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("PRIVATE-TOKEN", &self.token)
            .header("User-Agent", &self.requester)
    }

    /// Resolve a numeric project id to its `(owner/name, http_url_to_repo)`
    /// (§4.8 PR/MR sync: a fork MR's source lives in a different project
    /// than the one this client is scoped to, and the merge-request API
    /// response only carries the source project's numeric id).
    async fn resolve_project(&self, project_id: i64) -> Result<(RepoFullName, String), ForgeError> {
        let url = format!("{}/projects/{project_id}", self.api_root());
        let response = self.request(reqwest::Method::GET, &url).send().await.map_err(|source| ForgeError::Http { source })?;
        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: url, status: response.status().as_u16() });
        }
        let body: Value = response.json().await.map_err(|source| ForgeError::Http { source })?;
        let path = body
            .get("path_with_namespace")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(&url, "missing path_with_namespace"))?;
        let (owner, name) = path.split_once('/').ok_or_else(|| malformed(&url, "malformed path_with_namespace"))?;
        let fullname = RepoFullName::new(owner, name).map_err(|_| malformed(&url, "malformed path_with_namespace"))?;
        let clone_url = body
            .get("http_url_to_repo")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(&url, "missing http_url_to_repo"))?
            .to_string();
        Ok((fullname, clone_url))
    }
}

#[async_trait]
impl RawConfigFetcher for GitLabClient {
    async fn fetch_hubcast_yaml(&self, fullname: &RepoFullName) -> Result<Vec<u8>, RepoConfigError> {
        let url = format!("{}/repository/files/.github%2Fhubcast.yml/raw?ref=HEAD", self.project_url(fullname));

        let response = self.request(reqwest::Method::GET, &url).send().await.map_err(|e| RepoConfigError::FetchFailed {
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
impl SourceForgeClient for GitLabClient {
    fn fullname(&self) -> &RepoFullName {
        &self.fullname
    }

    async fn has_open_pr_for_branch(&self, branch: &str) -> Result<bool, ForgeError> {
        let url = format!(
            "{}/merge_requests?state=opened&source_branch={branch}",
            self.project_url(&self.fullname)
        );
        let response = self.request(reqwest::Method::GET, &url).send().await.map_err(|source| ForgeError::Http { source })?;
        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: url, status: response.status().as_u16() });
        }
        let body: Vec<Value> = response.json().await.map_err(|source| ForgeError::Http { source })?;
        Ok(!body.is_empty())
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequestRef, ForgeError> {
        let url = format!("{}/merge_requests/{number}", self.project_url(&self.fullname));
        let response = self.request(reqwest::Method::GET, &url).send().await.map_err(|source| ForgeError::Http { source })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ForgeError::NotFound { what: format!("merge request !{number}") });
        }
        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: url.clone(), status: response.status().as_u16() });
        }

        let body: Value = response.json().await.map_err(|source| ForgeError::Http { source })?;
        let parsed = parse_merge_request(&body, number, &url)?;

        // A fork MR's head commit lives only in the source project, never
        // in this one (§4.8 PR/MR sync); resolve its own path and clone URL
        // rather than mirroring from the target project's remote.
        let (head_repo_fullname, head_repo_clone_url) = match parsed.source_project_id {
            Some(source_project_id) if parsed.from_fork => {
                let (fullname, clone_url) = self.resolve_project(source_project_id).await?;
                (fullname, Some(clone_url))
            }
            _ => (self.fullname.clone(), None),
        };

        Ok(PullRequestRef {
            number,
            head_sha: parsed.head_sha,
            head_ref: parsed.head_ref,
            from_fork: parsed.from_fork,
            head_repo_private: parsed.head_repo_private,
            head_repo_fullname,
            head_repo_clone_url,
        })
    }

    async fn fetch_hubcast_yaml(&self) -> Result<Vec<u8>, ForgeError> {
        RawConfigFetcher::fetch_hubcast_yaml(self, &self.fullname).await.map_err(ForgeError::RepoConfig)
    }

    /// GitLab commit statuses pass the destination status through
    /// unchanged, unlike GitHub's two-field translation (§4.8).
    async fn set_check_status(
        &self,
        sha: &ObjectId,
        check_name: &str,
        status: PipelineStatus,
        target_url: Option<&str>,
    ) -> Result<(), ForgeError> {
        let url = format!("{}/statuses/{}", self.project_url(&self.fullname), sha.as_hex());
        let mut body = json!({
            "state": status.as_str(),
            "name": check_name,
        });
        if let Some(target_url) = target_url {
            body["target_url"] = json!(target_url);
        }

        let response = self.request(reqwest::Method::POST, &url).json(&body).send().await.map_err(|source| ForgeError::Http { source })?;
        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: url, status: response.status().as_u16() });
        }
        Ok(())
    }

    async fn post_comment(&self, issue_number: u64, body: &str) -> Result<(), ForgeError> {
        let url = format!("{}/merge_requests/{issue_number}/notes", self.project_url(&self.fullname));
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&json!({ "body": body }))
            .send()
            .await
            .map_err(|source| ForgeError::Http { source })?;
        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: url, status: response.status().as_u16() });
        }
        Ok(())
    }

    /// GitLab has no reaction-on-comment primitive in this integration's
    /// scope; this is a documented no-op (§4.8).
    async fn add_reaction_thumbsup(&self, _comment_id: u64) -> Result<(), ForgeError> {
        Ok(())
    }
}

#[async_trait]
impl DestinationClient for GitLabClient {
    fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn token(&self) -> &str {
        &self.token
    }

    fn username(&self) -> &str {
        &self.username
    }

    async fn ensure_callback_webhook(&self, dest_org: &str, dest_name: &str, callback_url: &str) -> Result<(), ForgeError> {
        let dest_fullname = RepoFullName::new(dest_org, dest_name).map_err(|e| ForgeError::Authentication { message: e.to_string() })?;
        let hooks_url = format!("{}/hooks", self.project_url(&dest_fullname));

        let response = self.request(reqwest::Method::GET, &hooks_url).send().await.map_err(|source| ForgeError::Http { source })?;
        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: hooks_url, status: response.status().as_u16() });
        }
        let hooks: Vec<Value> = response.json().await.map_err(|source| ForgeError::Http { source })?;
        let already_registered = hooks.iter().any(|hook| hook.get("url").and_then(Value::as_str) == Some(callback_url));
        if already_registered {
            return Ok(());
        }

        let response = self
            .request(reqwest::Method::POST, &hooks_url)
            .json(&json!({
                "url": callback_url,
                "pipeline_events": true,
                "enable_ssl_verification": true,
            }))
            .send()
            .await
            .map_err(|source| ForgeError::Http { source })?;
        if !response.status().is_success() {
            return Err(ForgeError::UnexpectedStatus { endpoint: hooks_url, status: response.status().as_u16() });
        }
        Ok(())
    }

    async fn run_pipeline(&self, dest_org: &str, dest_name: &str, branch: &str) -> Result<Option<String>, ForgeError> {
        let dest_fullname = RepoFullName::new(dest_org, dest_name).map_err(|e| ForgeError::Authentication { message: e.to_string() })?;
        let url = format!("{}/pipeline?ref={branch}", self.project_url(&dest_fullname));

        let response = self.request(reqwest::Method::POST, &url).send().await.map_err(|source| ForgeError::Http { source })?;
        if !response.status().is_success() {
            return Ok(None);
        }

        let body: Value = response.json().await.map_err(|source| ForgeError::Http { source })?;
        Ok(body.get("web_url").and_then(Value::as_str).map(str::to_string))
    }
}

/// Intermediate parse result before the (possibly fork-crossing) head-repo
/// identity is resolved by `get_pull_request`.
struct ParsedMergeRequest {
    head_sha: ObjectId,
    head_ref: String,
    from_fork: bool,
    head_repo_private: bool,
    source_project_id: Option<i64>,
}

fn parse_merge_request(body: &Value, _number: u64, url: &str) -> Result<ParsedMergeRequest, ForgeError> {
    let head_sha_str = body
        .get("sha")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(url, "missing sha"))?;
    let head_sha = ObjectId::from_str(head_sha_str).map_err(|_| malformed(url, "unparseable sha"))?;
    let head_ref = body
        .get("source_branch")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(url, "missing source_branch"))?
        .to_string();

    let source_project_id = body.get("source_project_id").and_then(Value::as_i64);
    let target_project_id = body.get("target_project_id").and_then(Value::as_i64);
    let from_fork = match (source_project_id, target_project_id) {
        (Some(s), Some(t)) => s != t,
        _ => true,
    };
    // GitLab reports visibility level 20 == public for the source project;
    // anything else is treated as private for the purpose of this check.
    let head_repo_private = body
        .get("source_project_id")
        .and_then(|_| body.get("visibility"))
        .and_then(Value::as_str)
        .map(|v| v != "public")
        .unwrap_or(false);

    Ok(ParsedMergeRequest { head_sha, head_ref, from_fork, head_repo_private, source_project_id })
}

fn malformed(endpoint: &str, message: &str) -> ForgeError {
    ForgeError::UnexpectedStatus { endpoint: format!("{endpoint} ({message})"), status: 0 }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
