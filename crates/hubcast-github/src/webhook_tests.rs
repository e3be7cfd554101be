//! Tests for GitHub webhook signature verification and event construction.

use super::*;

fn signed_headers(secret: &str, body: &[u8]) -> HashMap<String, String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    let mut headers = HashMap::new();
    headers.insert("x-github-event".to_string(), "push".to_string());
    headers.insert("x-github-delivery".to_string(), "11111111-2222-3333-4444-555555555555".to_string());
    headers.insert("x-hub-signature-256".to_string(), signature);
    headers
}

#[test]
fn test_verify_signature_accepts_matching_hmac() {
    let body = br#"{"ref":"refs/heads/main"}"#;
    let mut mac = HmacSha256::new_from_slice(b"topsecret").unwrap();
    mac.update(body);
    let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    assert!(verify_signature("topsecret", body, &signature).is_ok());
}

#[test]
fn test_verify_signature_rejects_wrong_secret() {
    let body = br#"{"ref":"refs/heads/main"}"#;
    let mut mac = HmacSha256::new_from_slice(b"topsecret").unwrap();
    mac.update(body);
    let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

    let err = verify_signature("wrong-secret", body, &signature).unwrap_err();
    assert!(matches!(err, GitHubWebhookError::SignatureMismatch));
}

#[test]
fn test_verify_signature_rejects_non_hex_signature() {
    let err = verify_signature("topsecret", b"{}", "sha256=not-hex").unwrap_err();
    assert!(matches!(err, GitHubWebhookError::InvalidSignatureEncoding));
}

#[test]
fn test_construct_event_succeeds_for_valid_request() {
    let body = br#"{"ref":"refs/heads/main","sender":{"login":"octocat"},"repository":{"full_name":"acme/widgets"}}"#;
    let headers = signed_headers("topsecret", body);

    let event = construct_event(&headers, body, "topsecret").unwrap();
    assert_eq!(event.kind().as_str(), "push");
    assert_eq!(event.delivery_id(), "11111111-2222-3333-4444-555555555555");
    assert_eq!(sender_login(&event).as_deref(), Some("octocat"));
    assert_eq!(source_repository(&event), Some(("acme".to_string(), "widgets".to_string())));
}

#[test]
fn test_construct_event_rejects_tampered_body() {
    let body = br#"{"ref":"refs/heads/main"}"#;
    let headers = signed_headers("topsecret", body);

    let tampered = br#"{"ref":"refs/heads/evil"}"#;
    let err = construct_event(&headers, tampered, "topsecret").unwrap_err();
    assert!(matches!(err, GitHubWebhookError::SignatureMismatch));
}

#[test]
fn test_construct_event_reports_missing_header() {
    let body = b"{}";
    let mut headers = signed_headers("topsecret", body);
    headers.remove("x-github-delivery");

    let err = construct_event(&headers, body, "topsecret").unwrap_err();
    match err {
        GitHubWebhookError::MissingHeader { header } => assert_eq!(header, "X-GitHub-Delivery"),
        other => panic!("expected MissingHeader, got {other:?}"),
    }
}

#[test]
fn test_sender_login_absent_when_field_missing() {
    let event = Event::new(EventKind::new("push"), "id", serde_json::json!({}));
    assert_eq!(sender_login(&event), None);
}
