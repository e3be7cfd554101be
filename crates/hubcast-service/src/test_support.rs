//! Hand-rolled stub clients shared by this crate's sync-handler tests,
//! following the model codebase's own cross-crate trait-boundary testing
//! style (manual stub structs rather than a mock-generation macro, since
//! `hubcast-core`'s `mockall::automock` is only available within its own
//! `#[cfg(test)]` build).

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use hubcast_core::{
    DestinationClient, ForgeError, GitCredentials, GitWireClient, GitWireError, ObjectId, PipelineStatus,
    PullRequestRef, RawConfigFetcher, RefMap, RefName, RepoConfigError, RepoConfigResolver, RepoFullName,
    SourceForgeClient,
};

use crate::config::SourceForgeKind;
use crate::metrics::ServiceMetrics;
use crate::sync_context::SyncContext;

#[derive(Default)]
pub struct StubSource {
    pub fullname: Option<RepoFullName>,
    pub has_open_pr: bool,
    pub pull_request: Option<PullRequestRef>,
    pub check_statuses: Arc<StdMutex<Vec<(ObjectId, String, PipelineStatus)>>>,
    pub comments: Arc<StdMutex<Vec<(u64, String)>>>,
    pub reactions: Arc<StdMutex<Vec<u64>>>,
}

#[async_trait]
impl SourceForgeClient for StubSource {
    fn fullname(&self) -> &RepoFullName {
        self.fullname.as_ref().expect("fullname not set on StubSource")
    }
    async fn has_open_pr_for_branch(&self, _branch: &str) -> Result<bool, ForgeError> {
        Ok(self.has_open_pr)
    }
    async fn get_pull_request(&self, _number: u64) -> Result<PullRequestRef, ForgeError> {
        self.pull_request.clone().ok_or_else(|| ForgeError::NotFound { what: "pull request".to_string() })
    }
    async fn fetch_hubcast_yaml(&self) -> Result<Vec<u8>, ForgeError> {
        unimplemented!("tests fetch via RawConfigFetcher directly")
    }
    async fn set_check_status(
        &self,
        sha: &ObjectId,
        check_name: &str,
        status: PipelineStatus,
        _target_url: Option<&str>,
    ) -> Result<(), ForgeError> {
        self.check_statuses.lock().unwrap().push((*sha, check_name.to_string(), status));
        Ok(())
    }
    async fn post_comment(&self, issue_number: u64, body: &str) -> Result<(), ForgeError> {
        self.comments.lock().unwrap().push((issue_number, body.to_string()));
        Ok(())
    }
    async fn add_reaction_thumbsup(&self, comment_id: u64) -> Result<(), ForgeError> {
        self.reactions.lock().unwrap().push(comment_id);
        Ok(())
    }
}

pub struct StubRawFetcher {
    pub yaml: Vec<u8>,
}

#[async_trait]
impl RawConfigFetcher for StubRawFetcher {
    async fn fetch_hubcast_yaml(&self, _fullname: &RepoFullName) -> Result<Vec<u8>, RepoConfigError> {
        Ok(self.yaml.clone())
    }
}

#[derive(Default)]
pub struct StubDestination {
    pub webhook_calls: Arc<StdMutex<u32>>,
    pub pipeline_url: Option<String>,
    pub pipeline_runs: Arc<StdMutex<Vec<(String, String, String)>>>,
}

#[async_trait]
impl DestinationClient for StubDestination {
    fn instance_url(&self) -> &str {
        "https://gitlab.example.com"
    }
    fn token(&self) -> &str {
        "dest-token"
    }
    fn username(&self) -> &str {
        "dest-user"
    }
    async fn ensure_callback_webhook(&self, _dest_org: &str, _dest_name: &str, _callback_url: &str) -> Result<(), ForgeError> {
        *self.webhook_calls.lock().unwrap() += 1;
        Ok(())
    }
    async fn run_pipeline(&self, dest_org: &str, dest_name: &str, branch: &str) -> Result<Option<String>, ForgeError> {
        self.pipeline_runs.lock().unwrap().push((dest_org.to_string(), dest_name.to_string(), branch.to_string()));
        Ok(self.pipeline_url.clone())
    }
}

#[derive(Default)]
pub struct StubGitWire {
    pub dest_refs: RefMap,
    pub sent: Arc<StdMutex<Vec<(String, ObjectId, ObjectId)>>>,
}

#[async_trait]
impl GitWireClient for StubGitWire {
    async fn ls_remote(&self, _url: &str, _credentials: Option<GitCredentials>) -> Result<RefMap, GitWireError> {
        Ok(self.dest_refs.clone())
    }
    async fn ls_remote_for_push(&self, _url: &str, _credentials: Option<GitCredentials>) -> Result<RefMap, GitWireError> {
        Ok(self.dest_refs.clone())
    }
    async fn fetch_pack(&self, _url: &str, _want: &ObjectId, _haves: &[ObjectId]) -> Result<bytes::Bytes, GitWireError> {
        Ok(bytes::Bytes::from_static(b"PACK"))
    }
    async fn send_pack(
        &self,
        _url: &str,
        reference: &RefName,
        from: &ObjectId,
        to: &ObjectId,
        _packfile: bytes::Bytes,
        _credentials: Option<GitCredentials>,
    ) -> Result<(), GitWireError> {
        self.sent.lock().unwrap().push((reference.as_str().to_string(), *from, *to));
        Ok(())
    }
}

pub struct Fixture {
    pub ctx: SyncContext,
    pub webhook_calls: Arc<StdMutex<u32>>,
    pub sent: Arc<StdMutex<Vec<(String, ObjectId, ObjectId)>>>,
    pub comments: Arc<StdMutex<Vec<(u64, String)>>>,
    pub reactions: Arc<StdMutex<Vec<u64>>>,
    pub pipeline_runs: Arc<StdMutex<Vec<(String, String, String)>>>,
    pub check_statuses: Arc<StdMutex<Vec<(ObjectId, String, PipelineStatus)>>>,
}

pub struct FixtureBuilder {
    fullname: RepoFullName,
    has_open_pr: bool,
    pull_request: Option<PullRequestRef>,
    dest_refs: RefMap,
    pipeline_url: Option<String>,
    yaml: Vec<u8>,
    source_kind: SourceForgeKind,
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self {
            fullname: RepoFullName::new("acme", "widgets").unwrap(),
            has_open_pr: false,
            pull_request: None,
            dest_refs: RefMap::new(),
            pipeline_url: None,
            yaml: b"Repo:\n  owner: dest-org\n  name: dest-repo\n".to_vec(),
            source_kind: SourceForgeKind::Github,
        }
    }

    pub fn has_open_pr(mut self, value: bool) -> Self {
        self.has_open_pr = value;
        self
    }

    pub fn pull_request(mut self, pr: PullRequestRef) -> Self {
        self.pull_request = Some(pr);
        self
    }

    pub fn dest_refs(mut self, refs: RefMap) -> Self {
        self.dest_refs = refs;
        self
    }

    pub fn pipeline_url(mut self, url: impl Into<String>) -> Self {
        self.pipeline_url = Some(url.into());
        self
    }

    pub fn source_kind(mut self, kind: SourceForgeKind) -> Self {
        self.source_kind = kind;
        self
    }

    pub fn build(self) -> Fixture {
        let webhook_calls = Arc::new(StdMutex::new(0));
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let comments = Arc::new(StdMutex::new(Vec::new()));
        let reactions = Arc::new(StdMutex::new(Vec::new()));
        let pipeline_runs = Arc::new(StdMutex::new(Vec::new()));
        let check_statuses = Arc::new(StdMutex::new(Vec::new()));

        let source = StubSource {
            fullname: Some(self.fullname),
            has_open_pr: self.has_open_pr,
            pull_request: self.pull_request,
            check_statuses: check_statuses.clone(),
            comments: comments.clone(),
            reactions: reactions.clone(),
        };
        let destination = StubDestination {
            webhook_calls: webhook_calls.clone(),
            pipeline_url: self.pipeline_url,
            pipeline_runs: pipeline_runs.clone(),
        };
        let git_wire = StubGitWire { dest_refs: self.dest_refs, sent: sent.clone() };

        let ctx = SyncContext {
            source: Arc::new(source),
            source_raw_fetcher: Arc::new(StubRawFetcher { yaml: self.yaml }),
            destination: Arc::new(destination),
            git_wire: Arc::new(git_wire),
            repo_config_resolver: Arc::new(RepoConfigResolver::new()),
            metrics: ServiceMetrics::new().unwrap(),
            source_kind: self.source_kind,
            source_git_base_url: "https://github.com".to_string(),
            source_fetch_credentials: None,
            callback_base_url: "https://hubcast.example.com".to_string(),
        };

        Fixture { ctx, webhook_calls, sent, comments, reactions, pipeline_runs, check_statuses }
    }
}
