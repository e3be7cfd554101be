//! Builds the two per-request [`Router`]s: one for `/v1/events/src/{forge}`
//! events and one for `/v1/events/dest/gitlab` events. A fresh router is
//! built per request rather than held in `AppState` because every callback
//! closes over a [`SyncContext`] scoped to clients resolved for that one
//! request (§4.7).

use std::sync::Arc;

use hubcast_core::router::Router;
use hubcast_core::EventKind;

use crate::config::SourceForgeKind;
use crate::sync_comment::CommentCommandCallback;
use crate::sync_context::SyncContext;
use crate::sync_pipeline::PipelineStatusRelayCallback;
use crate::sync_pull_request::{PullRequestCloseCallback, PullRequestSyncCallback};
use crate::sync_push::PushSyncCallback;

/// Build the router dispatched to for events arriving on the source forge's
/// ingress endpoint (GitHub or GitLab).
pub fn build_source_router(ctx: SyncContext) -> Router {
    let mut router = Router::new();

    let (push_kind, pr_kind) = match ctx.source_kind {
        SourceForgeKind::Github => (EventKind::GITHUB_PUSH, EventKind::GITHUB_PULL_REQUEST),
        SourceForgeKind::Gitlab => (EventKind::GITLAB_PUSH_HOOK, EventKind::GITLAB_MERGE_REQUEST_HOOK),
    };

    router.register(push_kind, Arc::new(PushSyncCallback { ctx: ctx.clone() }));
    router.register(pr_kind, Arc::new(PullRequestSyncCallback { ctx: ctx.clone() }));
    router.register(pr_kind, Arc::new(PullRequestCloseCallback { ctx: ctx.clone() }));

    if ctx.source_kind == SourceForgeKind::Github {
        router.register(EventKind::GITHUB_ISSUE_COMMENT, Arc::new(CommentCommandCallback { ctx }));
    }

    router
}

/// Build the router dispatched to for the destination's callback webhook
/// (pipeline-status relay only, §4.7, §4.8). `check_name` is the
/// `src_check_name` query parameter the ingress handler parsed off the
/// callback URL.
pub fn build_destination_router(ctx: SyncContext, check_name: String) -> Router {
    let mut router = Router::new();
    router.register(EventKind::GITLAB_PIPELINE_HOOK, Arc::new(PipelineStatusRelayCallback { ctx, check_name }));
    router
}

/// The event kinds [`build_source_router`] would register for a given
/// source forge, without needing a live [`SyncContext`] to build it —
/// used by `hubcast routes print` (§10.6) to show the wiring without
/// starting the listener or minting any forge credentials.
pub fn source_route_table(source_kind: SourceForgeKind) -> Vec<&'static str> {
    let (push_kind, pr_kind) = match source_kind {
        SourceForgeKind::Github => (EventKind::GITHUB_PUSH, EventKind::GITHUB_PULL_REQUEST),
        SourceForgeKind::Gitlab => (EventKind::GITLAB_PUSH_HOOK, EventKind::GITLAB_MERGE_REQUEST_HOOK),
    };

    let mut table = vec![push_kind, pr_kind];
    if source_kind == SourceForgeKind::Github {
        table.push(EventKind::GITHUB_ISSUE_COMMENT);
    }
    table.sort_unstable();
    table
}

/// The event kinds [`build_destination_router`] would register (§10.6).
pub fn destination_route_table() -> Vec<&'static str> {
    vec![EventKind::GITLAB_PIPELINE_HOOK]
}

#[cfg(test)]
#[path = "router_wiring_tests.rs"]
mod tests;
