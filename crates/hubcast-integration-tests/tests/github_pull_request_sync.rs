//! Pull request opened from a fork, mirrored end to end through the real
//! git-wire and forge-client implementations (GitHub PR opened/synchronize).

mod common;

use hubcast_core::router::EventCallback;
use hubcast_core::{Event, EventKind};
use hubcast_service::sync_pull_request::PullRequestSyncCallback;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pull_request_event(action: &str, number: u64, head_sha: &str) -> Event {
    Event::new(
        EventKind::new(EventKind::GITHUB_PULL_REQUEST),
        "delivery-pr-1",
        json!({
            "action": action,
            "number": number,
            "pull_request": {
                "head": {
                    "sha": head_sha,
                    "ref": "feature-branch",
                    "repo": { "full_name": "forker/widgets", "private": false },
                },
                "base": {
                    "repo": { "full_name": "acme/widgets" },
                },
            },
            "repository": { "full_name": "acme/widgets" },
        }),
    )
}

const HUBCAST_YAML: &[u8] = b"Repo:\n  owner: dest-org\n  name: dest-repo\n";

async fn mount_common(github: &MockServer, gitlab: &MockServer, number: u64, head_sha: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/widgets/pulls/{number}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "head": {
                "sha": head_sha,
                "ref": "feature-branch",
                "repo": { "full_name": "forker/widgets", "private": false },
            },
            "base": { "repo": { "full_name": "acme/widgets" } },
        })))
        .mount(github)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents/.github/hubcast.yml"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(HUBCAST_YAML))
        .mount(github)
        .await;

    Mock::given(method("GET"))
        .and(path("/dest-org/dest-repo.git/info/refs"))
        .and(query_param("service", "git-receive-pack"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(common::info_refs_body("git-receive-pack", &[])))
        .mount(gitlab)
        .await;

    // The head commit lives only in the fork, never in the base repo
    // (§4.8 PR/MR sync): the pack must be fetched from `forker/widgets`.
    Mock::given(method("POST"))
        .and(path("/forker/widgets.git/git-upload-pack"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(common::upload_pack_response(common::FAKE_PACKFILE)))
        .mount(github)
        .await;

    Mock::given(method("POST"))
        .and(path("/dest-org/dest-repo.git/git-receive-pack"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(common::receive_pack_report_ok(&format!(
            "refs/heads/pr-{number}"
        ))))
        .mount(gitlab)
        .await;
}

#[tokio::test]
async fn pull_request_opened_from_a_fork_mirrors_the_head_onto_a_pr_branch() {
    let github = MockServer::start().await;
    let gitlab = MockServer::start().await;
    let head_sha = "1111111111111111111111111111111111111111";
    mount_common(&github, &gitlab, 42, head_sha).await;

    let fixture = common::github_sync_context(&github, &gitlab, "acme", "widgets");
    let callback = PullRequestSyncCallback { ctx: fixture.ctx };
    let event = pull_request_event("opened", 42, head_sha);

    callback.call(&event).await.expect("sync should succeed");
}

#[tokio::test]
async fn pull_request_synchronize_advances_the_pr_branch_to_the_new_head() {
    let github = MockServer::start().await;
    let gitlab = MockServer::start().await;
    let head_sha = "2222222222222222222222222222222222222222";
    mount_common(&github, &gitlab, 42, head_sha).await;

    let fixture = common::github_sync_context(&github, &gitlab, "acme", "widgets");
    let callback = PullRequestSyncCallback { ctx: fixture.ctx };
    let event = pull_request_event("synchronize", 42, head_sha);

    callback.call(&event).await.expect("sync should succeed");
}

#[tokio::test]
async fn pull_request_sync_is_a_noop_for_an_unrelated_action() {
    let github = MockServer::start().await;
    let gitlab = MockServer::start().await;
    // No mocks mounted at all: if the callback made any HTTP call it would
    // fail to connect to a server with zero registered mocks.
    let fixture = common::github_sync_context(&github, &gitlab, "acme", "widgets");
    let callback = PullRequestSyncCallback { ctx: fixture.ctx };
    let event = pull_request_event("labeled", 42, "3333333333333333333333333333333333333333");

    callback.call(&event).await.expect("a non-sync action must be a silent no-op");
}
