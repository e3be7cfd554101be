//! Shared state and the ref-mirror primitive used by every sync callback
//! (§4.8). A [`SyncContext`] is built once per ingress request, scoped to
//! the source/destination clients the ingress handler already resolved
//! (§4.7 steps 3-4), and handed to the callbacks the router dispatches.

use std::sync::Arc;

use hubcast_core::{
    ForgeError, GitCredentials, GitWireClient, GitWireError, ObjectId, RawConfigFetcher, RefName,
    RepoConfigError, RepoConfigResolver, SourceForgeClient,
};

use crate::config::SourceForgeKind;
use crate::metrics::ServiceMetrics;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("git wire operation failed: {0}")]
    GitWire(#[from] GitWireError),

    #[error("forge API call failed: {0}")]
    Forge(#[from] ForgeError),

    #[error("repo config error: {0}")]
    RepoConfig(#[from] RepoConfigError),

    #[error("source is a private fork; cannot read: {fullname}")]
    PrivateForkForbidden { fullname: String },

    #[error("malformed event payload: {message}")]
    InvalidPayload { message: String },
}

impl SyncError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::GitWire(e) => e.is_transient(),
            Self::Forge(e) => e.is_transient(),
            Self::RepoConfig(e) => e.is_transient(),
            Self::PrivateForkForbidden { .. } | Self::InvalidPayload { .. } => false,
        }
    }

    pub fn error_category(&self) -> hubcast_core::ErrorCategory {
        match self {
            Self::GitWire(e) => e.error_category(),
            Self::Forge(e) => e.error_category(),
            Self::RepoConfig(e) => e.error_category(),
            Self::PrivateForkForbidden { .. } => hubcast_core::ErrorCategory::Permanent,
            Self::InvalidPayload { .. } => hubcast_core::ErrorCategory::InvalidInput,
        }
    }

    /// The `outcome` label recorded on `hubcast_sync_outcomes_total` (§10.3).
    pub fn metrics_outcome(&self) -> &'static str {
        match self {
            Self::GitWire(_) => "git_wire_failure",
            _ => "upstream_failure",
        }
    }
}

/// The clients and shared services one ingress request's dispatch needs.
/// Built fresh per request (§4.7) rather than held statically in
/// `AppState`, since the source/destination clients are scoped to the
/// webhook sender's resolved destination identity.
#[derive(Clone)]
pub struct SyncContext {
    pub source: Arc<dyn SourceForgeClient>,
    pub source_raw_fetcher: Arc<dyn RawConfigFetcher>,
    pub destination: Arc<dyn hubcast_core::DestinationClient>,
    pub git_wire: Arc<dyn GitWireClient>,
    pub repo_config_resolver: Arc<RepoConfigResolver>,
    pub metrics: Arc<ServiceMetrics>,
    pub source_kind: SourceForgeKind,
    /// Base URL to reach the source repository over git smart-HTTP, e.g.
    /// `https://github.com` or a GitLab instance URL.
    pub source_git_base_url: String,
    /// Credentials embedded into the source fetch URL, since `fetch_pack`
    /// takes no credential parameter (§4.9) — the source token must travel
    /// in the URL itself.
    pub source_fetch_credentials: Option<GitCredentials>,
    /// This service's own externally reachable base URL, used to build the
    /// destination callback webhook target (§4.7, §4.8 push/branch-update).
    pub callback_base_url: String,
}

impl SyncContext {
    pub fn source_remote_url(&self, owner: &str, name: &str) -> String {
        let url = format!("{}/{}/{}.git", self.source_git_base_url.trim_end_matches('/'), owner, name);
        embed_credentials(&url, self.source_fetch_credentials.as_ref())
    }

    /// The URL a pull/merge request's head commit must be fetched from
    /// (§4.8 PR/MR sync): a forge-provided clone URL (GitLab
    /// `source.git_http_url`/`http_url_to_repo`) takes precedence over the
    /// derived `{source_git_base_url}/{owner}/{name}.git` form, since a
    /// fork's own clone URL is authoritative when the forge hands it to us
    /// directly.
    pub fn source_remote_url_for(&self, fullname: &hubcast_core::RepoFullName, explicit_clone_url: Option<&str>) -> String {
        match explicit_clone_url {
            Some(url) => embed_credentials(url, self.source_fetch_credentials.as_ref()),
            None => {
                let (owner, name) = fullname.parts();
                self.source_remote_url(owner, name)
            }
        }
    }
}

fn embed_credentials(url: &str, credentials: Option<&GitCredentials>) -> String {
    let Some(credentials) = credentials else {
        return url.to_string();
    };
    let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
        return url.to_string();
    };
    format!("{}{}:{}@{}", &url[..scheme_end], credentials.username, credentials.password, &url[scheme_end..])
}

/// The push/branch-update and PR/MR-sync mirror primitive (§4.8): discover
/// destination refs, skip if `want` is already reachable, otherwise fetch a
/// pack from the source and push it onto `target_ref` on the destination.
pub async fn mirror_ref(
    ctx: &SyncContext,
    src_url: &str,
    dest_url: &str,
    target_ref: &RefName,
    want: &ObjectId,
    dest_credentials: GitCredentials,
) -> Result<(), SyncError> {
    let started = std::time::Instant::now();
    let have_map = ctx.git_wire.ls_remote_for_push(dest_url, Some(dest_credentials.clone())).await?;
    ctx.metrics.record_git_wire_duration(started.elapsed().as_secs_f64());

    if have_map.values().any(|sha| sha == want) {
        return Ok(());
    }
    let from_sha = have_map.get(target_ref).cloned().unwrap_or_else(ObjectId::zero);
    let haves: Vec<ObjectId> = have_map.into_values().collect();

    let started = std::time::Instant::now();
    let pack = ctx.git_wire.fetch_pack(src_url, want, &haves).await?;
    ctx.metrics.record_git_wire_duration(started.elapsed().as_secs_f64());

    let started = std::time::Instant::now();
    ctx.git_wire.send_pack(dest_url, target_ref, &from_sha, want, pack, Some(dest_credentials)).await?;
    ctx.metrics.record_git_wire_duration(started.elapsed().as_secs_f64());

    Ok(())
}

/// The push-delete / PR-close mirror primitive (§4.8): delete `target_ref`
/// on the destination by pushing an empty pack from its current sha to
/// all-zero. A no-op (not an error) when the ref is already absent.
pub async fn delete_ref(
    ctx: &SyncContext,
    dest_url: &str,
    target_ref: &RefName,
    dest_credentials: GitCredentials,
) -> Result<(), SyncError> {
    let have_map = ctx.git_wire.ls_remote_for_push(dest_url, Some(dest_credentials.clone())).await?;
    let Some(head_sha) = have_map.get(target_ref).cloned() else {
        return Ok(());
    };
    ctx.git_wire
        .send_pack(dest_url, target_ref, &head_sha, &ObjectId::zero(), bytes::Bytes::new(), Some(dest_credentials))
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "sync_context_tests.rs"]
mod tests;
