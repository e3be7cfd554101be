//! Pull/merge request sync and close (§4.8).

use async_trait::async_trait;
use hubcast_core::router::EventCallback;
use hubcast_core::{Event, GitCredentials, PullRequestRef, RepoFullName};
use serde_json::Value;

use crate::config::SourceForgeKind;
use crate::sync_context::{delete_ref, mirror_ref, SyncContext, SyncError};

fn source_repository(ctx: &SyncContext, event: &Event) -> Option<(String, String)> {
    match ctx.source_kind {
        SourceForgeKind::Github => hubcast_github::source_repository(event),
        SourceForgeKind::Gitlab => hubcast_gitlab::source_repository(event),
    }
}

fn pr_number(ctx: &SyncContext, event: &Event) -> Option<u64> {
    match ctx.source_kind {
        SourceForgeKind::Github => event.field_path(&["number"]).and_then(Value::as_u64),
        SourceForgeKind::Gitlab => event.field_path(&["object_attributes", "iid"]).and_then(Value::as_u64),
    }
}

fn pr_action<'a>(ctx: &SyncContext, event: &'a Event) -> Option<&'a str> {
    match ctx.source_kind {
        SourceForgeKind::Github => event.field_path(&["action"]).and_then(Value::as_str),
        SourceForgeKind::Gitlab => event.field_path(&["object_attributes", "action"]).and_then(Value::as_str),
    }
}

fn target_ref(ctx: &SyncContext, pr: &PullRequestRef) -> hubcast_core::RefName {
    match ctx.source_kind {
        SourceForgeKind::Github => pr.github_target_ref(),
        SourceForgeKind::Gitlab => pr.gitlab_target_ref(),
    }
}

/// Mirror a single pull/merge request's head onto the destination (§4.8).
/// Shared by the event-triggered sync below and the `/hubcast approve`
/// comment command.
pub async fn sync_pull_request(ctx: &SyncContext, fullname: &RepoFullName, pr: &PullRequestRef) -> Result<(), SyncError> {
    if pr.from_fork && pr.head_repo_private {
        return Err(SyncError::PrivateForkForbidden { fullname: fullname.to_string() });
    }

    let repo_config = ctx.repo_config_resolver.get(fullname, ctx.source_raw_fetcher.as_ref(), false).await?;
    let dest_url = repo_config.dest_remote_url(ctx.destination.instance_url());
    let dest_credentials = GitCredentials::new(ctx.destination.username(), ctx.destination.token());
    // Fetch from the head repo, not the base: for a fork PR/MR, `head_sha`
    // is only reachable from the head repo's own history (§4.8 PR/MR sync).
    let src_url = ctx.source_remote_url_for(&pr.head_repo_fullname, pr.head_repo_clone_url.as_deref());
    let target = target_ref(ctx, pr);

    mirror_ref(ctx, &src_url, &dest_url, &target, &pr.head_sha, dest_credentials).await
}

pub struct PullRequestSyncCallback {
    pub ctx: SyncContext,
}

#[async_trait]
impl EventCallback for PullRequestSyncCallback {
    fn name(&self) -> &str {
        "pull_request_sync"
    }

    async fn call(&self, event: &Event) -> Result<(), String> {
        let result = self.handle(event).await;
        let outcome = match &result {
            Ok(()) => "ok",
            Err(e) => e.metrics_outcome(),
        };
        self.ctx.metrics.record_sync_outcome("pull_request_sync", outcome);
        result.map_err(|e| e.to_string())
    }
}

const GITHUB_SYNC_ACTIONS: &[&str] = &["opened", "reopened", "synchronize"];
const GITLAB_SYNC_ACTIONS: &[&str] = &["open", "reopen", "update"];

impl PullRequestSyncCallback {
    async fn handle(&self, event: &Event) -> Result<(), SyncError> {
        let Some(action) = pr_action(&self.ctx, event) else {
            return Ok(());
        };
        let allowed = match self.ctx.source_kind {
            SourceForgeKind::Github => GITHUB_SYNC_ACTIONS,
            SourceForgeKind::Gitlab => GITLAB_SYNC_ACTIONS,
        };
        if !allowed.contains(&action) {
            return Ok(());
        }

        let number = pr_number(&self.ctx, event).ok_or_else(|| SyncError::InvalidPayload {
            message: "missing pull/merge request number".to_string(),
        })?;
        let (owner, name) = source_repository(&self.ctx, event).ok_or_else(|| SyncError::InvalidPayload {
            message: "missing source repository".to_string(),
        })?;
        let fullname = RepoFullName::new(&owner, &name).map_err(|e| SyncError::InvalidPayload { message: e.to_string() })?;

        let pr = self.ctx.source.get_pull_request(number).await?;
        sync_pull_request(&self.ctx, &fullname, &pr).await
    }
}

pub struct PullRequestCloseCallback {
    pub ctx: SyncContext,
}

#[async_trait]
impl EventCallback for PullRequestCloseCallback {
    fn name(&self) -> &str {
        "pull_request_close"
    }

    async fn call(&self, event: &Event) -> Result<(), String> {
        let result = self.handle(event).await;
        let outcome = match &result {
            Ok(()) => "ok",
            Err(e) => e.metrics_outcome(),
        };
        self.ctx.metrics.record_sync_outcome("pull_request_close", outcome);
        result.map_err(|e| e.to_string())
    }
}

impl PullRequestCloseCallback {
    async fn handle(&self, event: &Event) -> Result<(), SyncError> {
        let Some(action) = pr_action(&self.ctx, event) else {
            return Ok(());
        };
        let is_close = match self.ctx.source_kind {
            SourceForgeKind::Github => action == "closed",
            SourceForgeKind::Gitlab => action == "close",
        };
        if !is_close {
            return Ok(());
        }

        let number = pr_number(&self.ctx, event).ok_or_else(|| SyncError::InvalidPayload {
            message: "missing pull/merge request number".to_string(),
        })?;
        let (owner, name) = source_repository(&self.ctx, event).ok_or_else(|| SyncError::InvalidPayload {
            message: "missing source repository".to_string(),
        })?;
        let fullname = RepoFullName::new(&owner, &name).map_err(|e| SyncError::InvalidPayload { message: e.to_string() })?;

        let pr = self.ctx.source.get_pull_request(number).await?;
        if !pr.from_fork {
            // the branch-delete push event (if any) cleans this up (§4.8).
            return Ok(());
        }

        let repo_config = self.ctx.repo_config_resolver.get(&fullname, self.ctx.source_raw_fetcher.as_ref(), false).await?;
        let dest_url = repo_config.dest_remote_url(self.ctx.destination.instance_url());
        let dest_credentials = GitCredentials::new(self.ctx.destination.username(), self.ctx.destination.token());
        let target = target_ref(&self.ctx, &pr);

        delete_ref(&self.ctx, &dest_url, &target, dest_credentials).await
    }
}

#[cfg(test)]
#[path = "sync_pull_request_tests.rs"]
mod tests;
