//! Tests for the file-backed account map.

use super::*;

#[tokio::test]
async fn test_lookup_returns_mapped_destination() {
    let map = FileAccountMap::from_yaml_str(
        "Users:\n  alice: alice.dest\n  bob: bob.dest\n",
    )
    .unwrap();

    assert_eq!(map.lookup("alice").await, Some("alice.dest".to_string()));
    assert_eq!(map.lookup("bob").await, Some("bob.dest".to_string()));
}

#[tokio::test]
async fn test_lookup_returns_none_for_unknown_identity() {
    let map = FileAccountMap::from_yaml_str("Users:\n  alice: alice.dest\n").unwrap();
    assert_eq!(map.lookup("carol").await, None);
}

#[test]
fn test_construction_fails_on_malformed_yaml() {
    let result = FileAccountMap::from_yaml_str("not: [valid, Users");
    assert!(result.is_err());
}

#[test]
fn test_construction_fails_when_users_key_missing() {
    let result = FileAccountMap::from_yaml_str("Other: {}\n");
    assert!(result.is_err());
}

#[test]
fn test_len_and_is_empty() {
    let map = FileAccountMap::from_yaml_str("Users: {}\n").unwrap();
    assert!(map.is_empty());
    assert_eq!(map.len(), 0);

    let map = FileAccountMap::from_yaml_str("Users:\n  a: b\n").unwrap();
    assert!(!map.is_empty());
    assert_eq!(map.len(), 1);
}

#[test]
fn test_from_path_reports_io_error_for_missing_file() {
    let result = FileAccountMap::from_path("/nonexistent/path/hubcast-users.yml");
    assert!(matches!(result, Err(AccountMapError::Io { .. })));
}
