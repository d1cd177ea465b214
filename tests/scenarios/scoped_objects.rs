//! Test: with-X steps bind a child object and run nested steps against it

use crate::helpers::*;
use actionpipe::core::record::ObjectKind;
use actionpipe::{Authorization, Request};

#[tokio::test]
async fn test_missing_follower_halts_before_rendering() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::User,
            "alice",
            "followers",
            Request::get("/user/alice/followers").with_query("followerId", "nonexistent"),
            Authorization::Anonymous,
        )
        .await;

    assert_error_status(&result, 404);
    assert!(sink.is_empty(), "nested view must not run: {}", sink);
}

#[tokio::test]
async fn test_follower_secret_opens_nested_view() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::User,
            "alice",
            "followers",
            Request::get("/user/alice/followers")
                .with_query("followerId", "fw1")
                .with_query("secret", "s3cret"),
            Authorization::Anonymous,
        )
        .await;

    assert_clean(&result);
    assert_eq!(sink, "<p class=\"follower\">Carol</p>");
}

#[tokio::test]
async fn test_follower_without_secret_is_unauthorized() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::User,
            "alice",
            "followers",
            Request::get("/user/alice/followers").with_query("followerId", "fw1"),
            Authorization::Anonymous,
        )
        .await;

    assert_error_status(&result, 401);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_new_folder_skips_lookup_and_is_created() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::User,
            "alice",
            "folders",
            Request::post("/user/alice/folders")
                .with_query("folderId", "new")
                .with_form("label", "Receipts"),
            Authorization::user("alice"),
        )
        .await;

    assert_clean(&result);
    assert!(sink.is_empty(), "views do not render on the write phase");
    assert_eq!(calls(&fixture.folder_loads), 0, "a new folder must not be looked up");

    let folders = fixture.children(ObjectKind::Folder, "alice").await;
    assert_eq!(folders.len(), 2);
    let created = folders
        .iter()
        .find(|f| f.field_str("label") == "Receipts")
        .expect("new folder saved");
    assert_eq!(created.owner_id.as_deref(), Some("alice"));
    assert!(!created.is_new);
}

#[tokio::test]
async fn test_absent_token_means_new() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::User,
            "alice",
            "folders",
            Request::get("/user/alice/folders"),
            Authorization::user("alice"),
        )
        .await;

    assert_clean(&result);
    assert_eq!(sink, "<h2></h2>");
    assert_eq!(calls(&fixture.folder_loads), 0);
}

#[tokio::test]
async fn test_existing_folder_is_looked_up_under_parent() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::User,
            "alice",
            "folders",
            Request::get("/user/alice/folders").with_query("folderId", "inbox"),
            Authorization::user("alice"),
        )
        .await;

    assert_clean(&result);
    assert_eq!(sink, "<h2>Inbox</h2>");
    assert_eq!(calls(&fixture.folder_loads), 1);
}

#[tokio::test]
async fn test_child_of_another_parent_is_not_found() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::User,
            "alice",
            "rules",
            Request::get("/user/alice/rules").with_query("ruleId", "r-bob"),
            Authorization::user("alice"),
        )
        .await;

    assert_error_status(&result, 404);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_nested_validation_error_halts_parent() {
    let fixture = fixture().await;

    let (result, _, _) = fixture
        .run_action(
            ObjectKind::User,
            "alice",
            "rules",
            Request::post("/user/alice/rules")
                .with_query("ruleId", "r1")
                .with_form("action", "delete-everything"),
            Authorization::user("alice"),
        )
        .await;

    assert_error_status(&result, 400);
    let stored = fixture.load(ObjectKind::Rule, "r1").await.expect("rule kept");
    assert_eq!(stored.field_str("action"), "mute");
}

#[tokio::test]
async fn test_child_shares_the_parent_response() {
    let fixture = fixture().await;
    let pipeline = compile(
        r#"
- step: with-rule
  action: view
  steps:
    - step: set-header
      name: X-Child
      value: "{{ objectId }}"
      direct: true
"#,
    );

    let mut builder = fixture
        .builder(
            ObjectKind::User,
            "alice",
            "view",
            Request::get("/user/alice").with_query("ruleId", "r1"),
            Authorization::user("alice"),
        )
        .await;
    let mut sink = String::new();
    let result = pipeline.get(builder.as_mut(), &mut sink).await;

    assert_clean(&result);
    assert_eq!(
        builder.scope().response_headers().get("X-Child").map(String::as_str),
        Some("r1")
    );
}

#[tokio::test]
async fn test_child_inherits_parent_action_by_default() {
    let fixture = fixture().await;
    let pipeline = compile(
        r#"
- step: with-follower
  steps:
    - step: set-header
      name: X-Action
      value: "{{ actionId }}"
      direct: true
    - step: view-fragment
      file: follower-view
"#,
    );

    let mut builder = fixture
        .builder(
            ObjectKind::User,
            "alice",
            "followers",
            Request::get("/user/alice/followers")
                .with_query("followerId", "fw1")
                .with_query("secret", "s3cret"),
            Authorization::Anonymous,
        )
        .await;
    let mut sink = String::new();
    let result = pipeline.get(builder.as_mut(), &mut sink).await;

    assert_clean(&result);
    assert_eq!(sink, "<p class=\"follower\">Carol</p>");
    assert_eq!(
        builder.scope().response_headers().get("X-Action").map(String::as_str),
        Some("followers")
    );
}
