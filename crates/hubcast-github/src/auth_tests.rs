//! Tests for GitHub App authentication.

use super::*;

fn authenticator() -> GitHubAuthenticator {
    GitHubAuthenticator::new("12345", "not a real key", "hubcast-test", Client::new())
}

#[tokio::test]
async fn test_mint_jwt_fails_on_unparseable_private_key() {
    let auth = authenticator();
    let err = auth.get_jwt().await.unwrap_err();
    assert!(matches!(err, GitHubAuthError::JwtSigning { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_get_installation_id_returns_cached_value_without_http_call() {
    let auth = authenticator();
    auth.installation_ids
        .lock()
        .await
        .insert(("acme".to_string(), "widgets".to_string()), 999);

    let id = auth.get_installation_id("acme", "widgets").await.unwrap();
    assert_eq!(id, 999);
}

#[tokio::test]
async fn test_authenticate_installation_returns_cached_token_without_signing_a_jwt() {
    let auth = authenticator();
    auth.installation_ids
        .lock()
        .await
        .insert(("acme".to_string(), "widgets".to_string()), 42);

    let far_future = Timestamp::now().epoch_seconds() + 3600;
    auth.installation_tokens
        .get_default("installation:42", || async move { Ok::<_, GitHubAuthError>((far_future, "cached-token".to_string())) })
        .await
        .unwrap();

    let token = auth.authenticate_installation("acme", "widgets").await.unwrap();
    assert_eq!(token, "cached-token");
}

#[test]
fn test_jwt_lifetime_matches_githubs_mandated_window() {
    assert_eq!(JWT_LIFETIME_SECONDS, 600);
    assert_eq!(JWT_CLOCK_SKEW_SECONDS, 60);
}
