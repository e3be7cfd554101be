//! Shared pkt-line fixture builders and context wiring for the scenario
//! tests in this crate. Every scenario drives the real `HttpGitWireClient`,
//! `GitHubClient`, and `GitLabClient` against `wiremock` servers standing in
//! for the source/destination hosts, so these helpers speak the same
//! smart-HTTP wire format `hubcast_core::git_wire` does.

use std::sync::Arc;

use hubcast_core::{GitWireClient, HttpGitWireClient, RepoConfigResolver};
use hubcast_service::config::SourceForgeKind;
use hubcast_service::metrics::ServiceMetrics;
use hubcast_service::sync_context::SyncContext;
use reqwest::Client;
use wiremock::MockServer;

fn pkt_line(payload: &str) -> Vec<u8> {
    let length = payload.len() + 4;
    let mut out = format!("{length:04x}").into_bytes();
    out.extend_from_slice(payload.as_bytes());
    out
}

fn flush() -> Vec<u8> {
    b"0000".to_vec()
}

/// Build an `info/refs` response body advertising `refs` (each a
/// `(sha, ref_name)` pair). An empty slice advertises no refs at all, the
/// shape a brand-new destination repository reports.
pub fn info_refs_body(service: &str, refs: &[(&str, &str)]) -> Vec<u8> {
    let mut body = pkt_line(&format!("# service={service}\n"));
    body.extend(flush());

    if refs.is_empty() {
        body.extend(pkt_line(&format!(
            "{} capabilities^{{}}\0report-status\n",
            "0".repeat(40)
        )));
    } else {
        for (i, (sha, reference)) in refs.iter().enumerate() {
            let line = if i == 0 {
                format!("{sha} {reference}\0report-status\n")
            } else {
                format!("{sha} {reference}\n")
            };
            body.extend(pkt_line(&line));
        }
    }
    body.extend(flush());
    body
}

/// Build a `git-upload-pack` response: a single `NAK` acknowledgement
/// followed by the raw packfile bytes.
pub fn upload_pack_response(pack: &[u8]) -> Vec<u8> {
    let mut body = pkt_line("NAK\n");
    body.extend_from_slice(pack);
    body
}

/// Build a successful `git-receive-pack` `report-status` response for a
/// single pushed ref.
pub fn receive_pack_report_ok(ref_name: &str) -> Vec<u8> {
    let mut body = pkt_line("unpack ok\n");
    body.extend(pkt_line(&format!("ok {ref_name}\n")));
    body.extend(flush());
    body
}

/// A packfile is opaque to the git-wire client past its ACK/NAK framing;
/// any non-empty byte string stands in for one in these tests.
pub const FAKE_PACKFILE: &[u8] = b"PACK\0\0\0\x02\0\0\0\x01fake-object-data";

pub fn http_git_wire() -> Arc<dyn GitWireClient> {
    Arc::new(HttpGitWireClient::new(Client::new()))
}

/// Build a [`SyncContext`] wired to real forge/git-wire clients pointed at
/// the given mock servers, standing in for the source forge's git host and
/// REST API and the destination GitLab instance, respectively.
pub struct ContextFixture {
    pub ctx: SyncContext,
}

pub fn github_sync_context(
    github: &MockServer,
    gitlab: &MockServer,
    source_owner: &str,
    source_name: &str,
) -> ContextFixture {
    let fullname = hubcast_core::RepoFullName::new(source_owner, source_name).unwrap();
    let http = Client::new();

    let source = Arc::new(
        hubcast_github::GitHubClient::new(fullname.clone(), "source-installation-token", http.clone(), "hubcast-test")
            .with_api_root(github.uri()),
    );
    let source_raw_fetcher = Arc::new(
        hubcast_github::GitHubClient::new(fullname.clone(), "source-installation-token", http.clone(), "hubcast-test")
            .with_api_root(github.uri()),
    );
    let destination = Arc::new(hubcast_gitlab::GitLabClient::new(
        fullname,
        gitlab.uri(),
        "dest-impersonation-token",
        "dest-user",
        http,
        "hubcast-test",
    ));

    let ctx = SyncContext {
        source,
        source_raw_fetcher,
        destination,
        git_wire: http_git_wire(),
        repo_config_resolver: Arc::new(RepoConfigResolver::new()),
        metrics: ServiceMetrics::new().unwrap(),
        source_kind: SourceForgeKind::Github,
        source_git_base_url: github.uri(),
        source_fetch_credentials: None,
        callback_base_url: "https://hubcast.example.com".to_string(),
    };

    ContextFixture { ctx }
}
