use hubcast_core::EventKind;

use super::*;
use crate::test_support::FixtureBuilder;

#[test]
fn test_github_source_router_registers_comment_commands() {
    let ctx = FixtureBuilder::new().source_kind(SourceForgeKind::Github).build().ctx;
    let router = build_source_router(ctx);

    let kinds: Vec<String> = router.registered_kinds().into_iter().map(|k| k.as_str().to_string()).collect();
    assert!(kinds.contains(&EventKind::GITHUB_PUSH.to_string()));
    assert!(kinds.contains(&EventKind::GITHUB_PULL_REQUEST.to_string()));
    assert!(kinds.contains(&EventKind::GITHUB_ISSUE_COMMENT.to_string()));
}

#[test]
fn test_gitlab_source_router_has_no_comment_command_registration() {
    let ctx = FixtureBuilder::new().source_kind(SourceForgeKind::Gitlab).build().ctx;
    let router = build_source_router(ctx);

    let kinds: Vec<String> = router.registered_kinds().into_iter().map(|k| k.as_str().to_string()).collect();
    assert!(kinds.contains(&EventKind::GITLAB_PUSH_HOOK.to_string()));
    assert!(kinds.contains(&EventKind::GITLAB_MERGE_REQUEST_HOOK.to_string()));
    assert!(!kinds.contains(&EventKind::GITHUB_ISSUE_COMMENT.to_string()));
}

#[test]
fn test_destination_router_registers_only_the_pipeline_hook() {
    let ctx = FixtureBuilder::new().build().ctx;
    let router = build_destination_router(ctx, "gitlab-ci".to_string());

    let kinds: Vec<String> = router.registered_kinds().into_iter().map(|k| k.as_str().to_string()).collect();
    assert_eq!(kinds, vec![EventKind::GITLAB_PIPELINE_HOOK.to_string()]);
}

#[test]
fn test_source_route_table_matches_the_live_github_router() {
    let ctx = FixtureBuilder::new().source_kind(SourceForgeKind::Github).build().ctx;
    let live: Vec<String> = build_source_router(ctx).registered_kinds().into_iter().map(|k| k.as_str().to_string()).collect();

    let table: Vec<String> = source_route_table(SourceForgeKind::Github).into_iter().map(str::to_string).collect();

    assert_eq!(live, table);
}

#[test]
fn test_destination_route_table_matches_the_live_router() {
    let ctx = FixtureBuilder::new().build().ctx;
    let live: Vec<String> =
        build_destination_router(ctx, "gitlab-ci".to_string()).registered_kinds().into_iter().map(|k| k.as_str().to_string()).collect();

    let table: Vec<String> = destination_route_table().into_iter().map(str::to_string).collect();

    assert_eq!(live, table);
}
