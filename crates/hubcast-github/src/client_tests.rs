//! Tests for the GitHub REST client.

use hubcast_core::RepoFullName;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn client_against(base: &str) -> GitHubClient {
    let fullname = RepoFullName::new("acme", "widgets").unwrap();
    GitHubClient::new(fullname, "installation-token", Client::new(), "hubcast-test").with_api_root(base)
}

#[tokio::test]
async fn test_has_open_pr_for_branch_true_when_list_nonempty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"number": 1}])))
        .mount(&server)
        .await;

    let client = client_against(&server.uri());
    assert!(client.has_open_pr_for_branch("feature").await.unwrap());
}

#[tokio::test]
async fn test_has_open_pr_for_branch_false_when_list_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client_against(&server.uri());
    assert!(!client.has_open_pr_for_branch("feature").await.unwrap());
}

#[tokio::test]
async fn test_get_pull_request_detects_fork() {
    let server = MockServer::start().await;
    let body = json!({
        "number": 7,
        "head": {
            "sha": "a".repeat(40),
            "ref": "feature",
            "repo": {"full_name": "contributor/widgets", "private": false},
        },
        "base": {"repo": {"full_name": "acme/widgets"}},
    });
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = client_against(&server.uri());
    let pr = client.get_pull_request(7).await.unwrap();
    assert_eq!(pr.number, 7);
    assert!(pr.from_fork);
    assert_eq!(pr.head_ref, "feature");
    assert_eq!(pr.head_repo_fullname.as_str(), "contributor/widgets");
    assert!(pr.head_repo_clone_url.is_none());
}

#[tokio::test]
async fn test_get_pull_request_not_found_maps_to_not_found_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls/999"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_against(&server.uri());
    let err = client.get_pull_request(999).await.unwrap_err();
    assert!(matches!(err, ForgeError::NotFound { .. }));
}

#[tokio::test]
async fn test_post_comment_sends_expected_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/issues/5/comments"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let client = client_against(&server.uri());
    client.post_comment(5, "hello").await.unwrap();
}

#[tokio::test]
async fn test_set_check_status_creates_when_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/widgets/commits/{}/check-runs", "c".repeat(40))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"check_runs": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/check-runs"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let client = client_against(&server.uri());
    let sha = ObjectId::from_str(&"c".repeat(40)).unwrap();
    client.set_check_status(&sha, "gitlab-ci", PipelineStatus::Running, None).await.unwrap();
}

#[tokio::test]
async fn test_set_check_status_patches_when_existing_check_not_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/widgets/commits/{}/check-runs", "c".repeat(40))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "check_runs": [{"id": 42, "name": "gitlab-ci", "status": "in_progress"}],
        })))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/repos/acme/widgets/check-runs/42"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_against(&server.uri());
    let sha = ObjectId::from_str(&"c".repeat(40)).unwrap();
    client.set_check_status(&sha, "gitlab-ci", PipelineStatus::Success, None).await.unwrap();
}

/// §4.8 / S5: a completed prior check-run must not be PATCHed — a new
/// check-run is created so a second pipeline run on the same commit shows
/// up as its own check rather than overwriting the terminal one.
#[tokio::test]
async fn test_set_check_status_creates_new_when_existing_check_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/widgets/commits/{}/check-runs", "c".repeat(40))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "check_runs": [{"id": 42, "name": "gitlab-ci", "status": "completed"}],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/check-runs"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let client = client_against(&server.uri());
    let sha = ObjectId::from_str(&"c".repeat(40)).unwrap();
    client.set_check_status(&sha, "gitlab-ci", PipelineStatus::Failed, None).await.unwrap();
}
