//! Forge-agnostic REST client interfaces (§2 "Forge Clients", §4.8).
//!
//! `hubcast-core` knows nothing about GitHub's or GitLab's REST surfaces;
//! it only defines the shapes sync handlers need. `hubcast-github` and
//! `hubcast-gitlab` each implement [`SourceForgeClient`] (and GitLab also
//! implements [`DestinationClient`], since the destination is always
//! GitLab per §1).

use async_trait::async_trait;

use crate::{ObjectId, RefName, RepoConfigError, RepoFullName};

/// The destination check/pipeline status vocabulary, used both as the
/// status reported by the destination GitLab pipeline hook and as the
/// input to `set_check_status` after translation (§4.8 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

impl PipelineStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

/// GitHub's two-field check-run vocabulary produced by translating a
/// [`PipelineStatus`] (§4.8 status-translation table). GitLab's
/// `set_check_status` takes the untranslated [`PipelineStatus`] directly,
/// since GitLab commit statuses pass destination status through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GitHubCheckStatus {
    pub status: &'static str,
    pub conclusion: Option<&'static str>,
}

impl GitHubCheckStatus {
    /// Translate a destination pipeline status into GitHub's check-run
    /// vocabulary. Total over every [`PipelineStatus`] variant (§8 invariant 6).
    pub fn from_pipeline_status(status: PipelineStatus) -> Self {
        match status {
            PipelineStatus::Pending => Self {
                status: "queued",
                conclusion: None,
            },
            PipelineStatus::Running => Self {
                status: "in_progress",
                conclusion: None,
            },
            PipelineStatus::Success => Self {
                status: "completed",
                conclusion: Some("success"),
            },
            PipelineStatus::Failed => Self {
                status: "completed",
                conclusion: Some("failure"),
            },
            PipelineStatus::Canceled => Self {
                status: "completed",
                conclusion: Some("cancelled"),
            },
        }
    }
}

/// The source/base identity and head commit of a pull/merge request,
/// normalized across GitHub and GitLab (§4.8 PR/MR sync, close).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
    pub head_sha: ObjectId,
    pub head_ref: String,
    pub from_fork: bool,
    /// `None` unless the source is a private fork, in which case the sync
    /// must abort (§4.8 PR/MR sync: "private forks cannot be read").
    pub head_repo_private: bool,
    /// `owner/name` of the repository the head commit actually lives in.
    /// Equal to the base repo's fullname unless `from_fork`. The pack must
    /// be fetched from here, not from the base repo (§4.8 PR/MR sync: GitHub
    /// `head.repo.clone_url`, GitLab `object_attributes.source.git_http_url`)
    /// — for a fork, `head_sha` is not reachable from the base repo at all.
    pub head_repo_fullname: RepoFullName,
    /// The head repo's git-http clone URL, when the forge's payload
    /// provides one directly (GitLab `source.git_http_url`). `None` for
    /// GitHub, where the clone URL is derived from `head_repo_fullname` and
    /// the instance's own git host instead.
    pub head_repo_clone_url: Option<String>,
}

impl PullRequestRef {
    /// The ref to mirror the PR/MR head onto on the destination (§4.8).
    pub fn github_target_ref(&self) -> RefName {
        if self.from_fork {
            RefName::github_pull_request(self.number)
        } else {
            RefName::branch(&self.head_ref)
        }
    }

    pub fn gitlab_target_ref(&self) -> RefName {
        if self.from_fork {
            RefName::gitlab_merge_request(self.number)
        } else {
            RefName::branch(&self.head_ref)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("forge API request to {endpoint} failed with status {status}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("forge API request failed: {source}")]
    Http {
        #[source]
        source: reqwest::Error,
    },

    #[error("forge authentication failed: {message}")]
    Authentication { message: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("repo config error: {0}")]
    RepoConfig(#[from] RepoConfigError),
}

impl ForgeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { .. } | Self::Http { .. })
    }

    pub fn error_category(&self) -> crate::ErrorCategory {
        match self {
            Self::UnexpectedStatus { .. } | Self::Http { .. } => crate::ErrorCategory::Transient,
            Self::Authentication { .. } => crate::ErrorCategory::Permanent,
            Self::NotFound { .. } => crate::ErrorCategory::Permanent,
            Self::RepoConfig(e) => e.error_category(),
        }
    }
}

/// High-level operations against the repository an event originated from,
/// scoped to one `(owner, repo)` for the lifetime of a single sync (§2).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceForgeClient: Send + Sync {
    fn fullname(&self) -> &RepoFullName;

    /// True if `branch` is the head ref of any open pull/merge request —
    /// used to skip a push-sync that a PR/MR sync will also handle (§4.8).
    async fn has_open_pr_for_branch(&self, branch: &str) -> Result<bool, ForgeError>;

    async fn get_pull_request(&self, number: u64) -> Result<PullRequestRef, ForgeError>;

    /// Fetch `.github/hubcast.yml` (or the forge-equivalent path) as raw
    /// bytes, for the repo-config resolver (§4.5).
    async fn fetch_hubcast_yaml(&self) -> Result<Vec<u8>, ForgeError>;

    /// Update (or create) the named check/commit-status for `sha` (§4.8
    /// pipeline-status relay). GitHub implementations translate
    /// `PipelineStatus` via [`GitHubCheckStatus`]; GitLab passes it through.
    async fn set_check_status(
        &self,
        sha: &ObjectId,
        check_name: &str,
        status: PipelineStatus,
        target_url: Option<&str>,
    ) -> Result<(), ForgeError>;

    /// Post a comment on the issue/merge-request thread (help text, approve
    /// acknowledgements, pipeline-run replies — §4.8 comment commands).
    async fn post_comment(&self, issue_number: u64, body: &str) -> Result<(), ForgeError>;

    /// Add a `+1` reaction to a comment (§4.8 comment commands). GitLab has
    /// no reaction-on-comment primitive in scope here; its implementation
    /// is a documented no-op.
    async fn add_reaction_thumbsup(&self, comment_id: u64) -> Result<(), ForgeError>;
}

/// High-level operations against the GitLab destination instance, scoped to
/// one impersonated destination user (§2, §4.8).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// The destination instance's base URL, e.g. `https://gitlab.example.com`.
    fn instance_url(&self) -> &str;

    /// The impersonation token minted for the resolved destination user.
    fn token(&self) -> &str;

    /// The destination username the token was minted for, used as the
    /// HTTP basic-auth username for git-wire pushes (§4.8).
    fn username(&self) -> &str;

    fn remote_url(&self, dest_org: &str, dest_name: &str) -> String {
        format!(
            "{}/{}/{}.git",
            self.instance_url().trim_end_matches('/'),
            dest_org,
            dest_name
        )
    }

    /// Ensure the destination project has a webhook pointed back at
    /// `/v1/events/dest/gitlab` carrying the given callback query
    /// parameters, so pipeline events relay back to the source (§4.8,
    /// §4.7 destination-handler routing).
    async fn ensure_callback_webhook(
        &self,
        dest_org: &str,
        dest_name: &str,
        callback_url: &str,
    ) -> Result<(), ForgeError>;

    /// Trigger a pipeline run on `branch` of the destination project
    /// (`/hubcast run pipeline` comment command, §4.8). Returns the
    /// pipeline's web URL on success.
    async fn run_pipeline(
        &self,
        dest_org: &str,
        dest_name: &str,
        branch: &str,
    ) -> Result<Option<String>, ForgeError>;
}

#[cfg(test)]
#[path = "forge_tests.rs"]
mod tests;
