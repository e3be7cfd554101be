//! Tests for the GitLab REST client.

use hubcast_core::RepoFullName;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn client_against(server: &MockServer) -> GitLabClient {
    let fullname = RepoFullName::new("acme", "widgets").unwrap();
    GitLabClient::new(fullname, server.uri(), "impersonation-token", "octocat", Client::new(), "hubcast-test")
}

#[tokio::test]
async fn test_has_open_pr_for_branch_true_when_list_nonempty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/acme%2Fwidgets/merge_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"iid": 1}])))
        .mount(&server)
        .await;

    let client = client_against(&server);
    assert!(client.has_open_pr_for_branch("feature").await.unwrap());
}

#[tokio::test]
async fn test_get_pull_request_detects_fork() {
    let server = MockServer::start().await;
    let body = json!({
        "sha": "a".repeat(40),
        "source_branch": "feature",
        "source_project_id": 2,
        "target_project_id": 1,
        "visibility": "public",
    });
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/acme%2Fwidgets/merge_requests/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "path_with_namespace": "forker/widgets",
            "http_url_to_repo": format!("{}/forker/widgets.git", server.uri()),
        })))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let mr = client.get_pull_request(7).await.unwrap();
    assert_eq!(mr.number, 7);
    assert!(mr.from_fork);
    assert!(!mr.head_repo_private);
    assert_eq!(mr.head_repo_fullname.as_str(), "forker/widgets");
    assert_eq!(mr.head_repo_clone_url.as_deref(), Some(format!("{}/forker/widgets.git", server.uri()).as_str()));
}

#[tokio::test]
async fn test_get_pull_request_not_fork_uses_own_repo() {
    let server = MockServer::start().await;
    let body = json!({
        "sha": "a".repeat(40),
        "source_branch": "feature",
        "source_project_id": 1,
        "target_project_id": 1,
        "visibility": "public",
    });
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/acme%2Fwidgets/merge_requests/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let mr = client.get_pull_request(7).await.unwrap();
    assert!(!mr.from_fork);
    assert_eq!(mr.head_repo_fullname.as_str(), "acme/widgets");
    assert!(mr.head_repo_clone_url.is_none());
}

#[tokio::test]
async fn test_get_pull_request_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/acme%2Fwidgets/merge_requests/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let err = client.get_pull_request(404).await.unwrap_err();
    assert!(matches!(err, ForgeError::NotFound { .. }));
}

#[tokio::test]
async fn test_set_check_status_posts_passthrough_state() {
    let server = MockServer::start().await;
    let sha = "b".repeat(40);
    Mock::given(method("POST"))
        .and(path(format!("/api/v4/projects/acme%2Fwidgets/statuses/{sha}")))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let object_id = ObjectId::from_str(&sha).unwrap();
    client.set_check_status(&object_id, "gitlab-ci", PipelineStatus::Success, None).await.unwrap();
}

#[tokio::test]
async fn test_add_reaction_thumbsup_is_a_noop() {
    let server = MockServer::start().await;
    let client = client_against(&server);
    client.add_reaction_thumbsup(1).await.unwrap();
}

#[tokio::test]
async fn test_ensure_callback_webhook_skips_when_already_registered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/acme%2Fwidgets/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"url": "https://hub.example/callback"}])))
        .mount(&server)
        .await;

    let client = client_against(&server);
    client.ensure_callback_webhook("acme", "widgets", "https://hub.example/callback").await.unwrap();
}

#[tokio::test]
async fn test_ensure_callback_webhook_registers_when_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/acme%2Fwidgets/hooks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v4/projects/acme%2Fwidgets/hooks"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let client = client_against(&server);
    client.ensure_callback_webhook("acme", "widgets", "https://hub.example/callback").await.unwrap();
}

#[tokio::test]
async fn test_run_pipeline_returns_web_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/projects/acme%2Fwidgets/pipeline"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"web_url": "https://gitlab.example/pipelines/1"})))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let url = client.run_pipeline("acme", "widgets", "main").await.unwrap();
    assert_eq!(url.as_deref(), Some("https://gitlab.example/pipelines/1"));
}
