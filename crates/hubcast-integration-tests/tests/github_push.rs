//! A push to `main` with no open pull request mirrors the branch onto the
//! destination and registers its pipeline-status callback webhook.

mod common;

use hubcast_core::router::EventCallback;
use hubcast_core::{Event, EventKind};
use hubcast_service::sync_push::PushSyncCallback;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HUBCAST_YAML: &[u8] = b"Repo:\n  owner: dest-org\n  name: dest-repo\n";

fn push_event(head_sha: &str) -> Event {
    Event::new(
        EventKind::new(EventKind::GITHUB_PUSH),
        "delivery-push-1",
        json!({
            "ref": "refs/heads/main",
            "deleted": false,
            "head_commit": { "id": head_sha },
            "repository": { "full_name": "acme/widgets" },
        }),
    )
}

#[tokio::test]
async fn push_to_main_mirrors_the_branch_and_registers_the_callback_webhook() {
    let github = MockServer::start().await;
    let gitlab = MockServer::start().await;
    let head_sha = "6666666666666666666666666666666666666666";

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls"))
        .and(query_param("state", "open"))
        .and(query_param("head", "acme:main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&github)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents/.github/hubcast.yml"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(HUBCAST_YAML))
        .mount(&github)
        .await;

    Mock::given(method("GET"))
        .and(path("/dest-org/dest-repo.git/info/refs"))
        .and(query_param("service", "git-receive-pack"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(common::info_refs_body("git-receive-pack", &[])))
        .mount(&gitlab)
        .await;

    Mock::given(method("POST"))
        .and(path("/acme/widgets.git/git-upload-pack"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(common::upload_pack_response(common::FAKE_PACKFILE)))
        .mount(&github)
        .await;

    Mock::given(method("POST"))
        .and(path("/dest-org/dest-repo.git/git-receive-pack"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(common::receive_pack_report_ok("refs/heads/main")))
        .mount(&gitlab)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v4/projects/dest-org%2Fdest-repo/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&gitlab)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v4/projects/dest-org%2Fdest-repo/hooks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
        .mount(&gitlab)
        .await;

    let fixture = common::github_sync_context(&github, &gitlab, "acme", "widgets");
    let callback = PushSyncCallback { ctx: fixture.ctx };
    let event = push_event(head_sha);

    callback.call(&event).await.expect("push sync should succeed");
}

#[tokio::test]
async fn push_is_skipped_when_the_branch_has_an_open_pull_request() {
    let github = MockServer::start().await;
    let gitlab = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls"))
        .and(query_param("state", "open"))
        .and(query_param("head", "acme:main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"number": 1}])))
        .mount(&github)
        .await;
    // No destination mocks mounted: the skip must happen before any
    // git-wire or webhook-registration call.

    let fixture = common::github_sync_context(&github, &gitlab, "acme", "widgets");
    let callback = PushSyncCallback { ctx: fixture.ctx };
    let event = push_event("7777777777777777777777777777777777777777");

    callback.call(&event).await.expect("skip should not be reported as a failure");
}
