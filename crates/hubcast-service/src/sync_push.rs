//! Push / branch-update and push-delete sync (§4.8).

use std::sync::Arc;

use async_trait::async_trait;
use hubcast_core::router::EventCallback;
use hubcast_core::{Event, GitCredentials, ObjectId, RefName, RepoFullName};
use serde_json::Value;

use crate::config::SourceForgeKind;
use crate::sync_context::{delete_ref, mirror_ref, SyncContext};

const ZERO_SHA_HEX: &str = "0000000000000000000000000000000000000000";

fn source_repository(ctx: &SyncContext, event: &Event) -> Option<(String, String)> {
    match ctx.source_kind {
        SourceForgeKind::Github => hubcast_github::source_repository(event),
        SourceForgeKind::Gitlab => hubcast_gitlab::source_repository(event),
    }
}

fn push_ref(event: &Event) -> Option<&str> {
    event.field_path(&["ref"]).and_then(Value::as_str)
}

fn push_is_delete(ctx: &SyncContext, event: &Event) -> bool {
    match ctx.source_kind {
        SourceForgeKind::Github => event.field_path(&["deleted"]).and_then(Value::as_bool).unwrap_or(false),
        SourceForgeKind::Gitlab => event
            .field_path(&["after"])
            .and_then(Value::as_str)
            .map(|s| s == ZERO_SHA_HEX)
            .unwrap_or(false),
    }
}

fn push_head_sha(ctx: &SyncContext, event: &Event) -> Option<ObjectId> {
    let raw = match ctx.source_kind {
        SourceForgeKind::Github => event.field_path(&["head_commit", "id"]).and_then(Value::as_str),
        SourceForgeKind::Gitlab => event.field_path(&["after"]).and_then(Value::as_str),
    }?;
    raw.parse().ok()
}

fn branch_name(full_ref: &str) -> &str {
    full_ref.strip_prefix("refs/heads/").unwrap_or(full_ref)
}

/// Query parameters on the callback webhook this handler registers on the
/// destination project, identifying the source repo for the pipeline-status
/// relay handler (§4.7, §6).
fn callback_query(ctx: &SyncContext, owner: &str, name: &str, check_name: &str) -> String {
    match ctx.source_kind {
        SourceForgeKind::Github => {
            format!("src_service=github&src_owner={owner}&src_repo_name={name}&src_check_name={check_name}")
        }
        SourceForgeKind::Gitlab => {
            let encoded = format!("{owner}/{name}").replace('/', "%2F");
            format!("src_service=gitlab&src_repo_id={encoded}&src_check_name={check_name}")
        }
    }
}

pub struct PushSyncCallback {
    pub ctx: SyncContext,
}

#[async_trait]
impl EventCallback for PushSyncCallback {
    fn name(&self) -> &str {
        "push_sync"
    }

    async fn call(&self, event: &Event) -> Result<(), String> {
        let result = self.handle(event).await;
        let outcome = match &result {
            Ok(()) => "ok",
            Err(e) => e.metrics_outcome(),
        };
        self.ctx.metrics.record_sync_outcome("push", outcome);
        result.map_err(|e| e.to_string())
    }
}

impl PushSyncCallback {
    async fn handle(&self, event: &Event) -> Result<(), crate::sync_context::SyncError> {
        use crate::sync_context::SyncError;

        let full_ref = push_ref(event).ok_or_else(|| SyncError::InvalidPayload {
            message: "missing ref".to_string(),
        })?;
        let branch = branch_name(full_ref);
        let target_ref = RefName::new(full_ref).map_err(|e| SyncError::InvalidPayload { message: e.to_string() })?;

        let (owner, name) = source_repository(&self.ctx, event).ok_or_else(|| SyncError::InvalidPayload {
            message: "missing source repository".to_string(),
        })?;
        let fullname = RepoFullName::new(&owner, &name).map_err(|e| SyncError::InvalidPayload { message: e.to_string() })?;

        let is_delete = push_is_delete(&self.ctx, event);
        if !is_delete && self.ctx.source.has_open_pr_for_branch(branch).await? {
            return Ok(());
        }

        let repo_config = self.ctx.repo_config_resolver.get(&fullname, self.ctx.source_raw_fetcher.as_ref(), true).await?;
        let dest_url = repo_config.dest_remote_url(self.ctx.destination.instance_url());
        let dest_credentials = GitCredentials::new(self.ctx.destination.username(), self.ctx.destination.token());

        if is_delete {
            return delete_ref(&self.ctx, &dest_url, &target_ref, dest_credentials).await;
        }

        let callback_url = format!(
            "{}/v1/events/dest/gitlab?{}",
            self.ctx.callback_base_url.trim_end_matches('/'),
            callback_query(&self.ctx, &owner, &name, &repo_config.check_name)
        );
        self.ctx
            .destination
            .ensure_callback_webhook(&repo_config.dest_org, &repo_config.dest_name, &callback_url)
            .await?;

        let want = push_head_sha(&self.ctx, event).ok_or_else(|| SyncError::InvalidPayload {
            message: "missing head commit sha".to_string(),
        })?;
        let src_url = self.ctx.source_remote_url(&owner, &name);
        mirror_ref(&self.ctx, &src_url, &dest_url, &target_ref, &want, dest_credentials).await
    }
}

#[cfg(test)]
#[path = "sync_push_tests.rs"]
mod tests;
