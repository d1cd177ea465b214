//! Test: add-child either lists eligible templates or creates one directly

use crate::helpers::*;
use actionpipe::core::error::Capability;
use actionpipe::core::record::ObjectKind;
use actionpipe::{Authorization, PipelineError, Request};

#[tokio::test]
async fn test_chooser_lists_eligible_templates_in_preference_order() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::Stream,
            "home",
            "add",
            Request::get("/stream/home/add").partial(),
            Authorization::user("alice"),
        )
        .await;

    assert_clean(&result);
    assert_eq!(
        sink,
        "<ul class=\"chooser\"><li data-template=\"article\">Article</li><li data-template=\"photo\">Photo</li></ul>"
    );
    assert!(fixture.children(ObjectKind::Stream, "home").await.is_empty());
}

#[tokio::test]
async fn test_template_hint_creates_directly() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::Stream,
            "home",
            "add",
            Request::get("/stream/home/add").with_query("templateId", "photo"),
            Authorization::user("alice"),
        )
        .await;

    assert_clean(&result);
    assert_eq!(sink, "<form id=\"create\">photo</form>");
}

#[tokio::test]
async fn test_inline_style_picks_first_eligible() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::Stream,
            "home",
            "add-inline",
            Request::get("/stream/home/add-inline"),
            Authorization::user("alice"),
        )
        .await;

    assert_clean(&result);
    assert_eq!(sink, "<form id=\"create\">article</form>");
}

#[tokio::test]
async fn test_single_eligible_template_skips_chooser() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::Stream,
            "home",
            "add-photo",
            Request::get("/stream/home/add-photo"),
            Authorization::user("alice"),
        )
        .await;

    assert_clean(&result);
    assert_eq!(sink, "<form id=\"create\">photo</form>");
}

#[tokio::test]
async fn test_posting_a_choice_saves_the_child() {
    let fixture = fixture().await;

    let (result, _, _) = fixture
        .run_action(
            ObjectKind::Stream,
            "home",
            "add",
            Request::post("/stream/home/add")
                .with_query("templateId", "article")
                .with_form("body", "First post"),
            Authorization::user("alice"),
        )
        .await;

    assert_clean(&result);
    let children = fixture.children(ObjectKind::Stream, "home").await;
    assert_eq!(children.len(), 1);
    let article = &children[0];
    assert_eq!(article.template_id.as_deref(), Some("article"));
    assert_eq!(article.owner_id.as_deref(), Some("alice"));
    assert_eq!(article.field_str("label"), "Untitled");
    assert_eq!(article.field_str("body"), "First post");
}

#[tokio::test]
async fn test_ineligible_hint_is_bad_request() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::Stream,
            "home",
            "add",
            Request::get("/stream/home/add").with_query("templateId", "folder-page"),
            Authorization::user("alice"),
        )
        .await;

    assert_error_status(&result, 400);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_post_without_choice_is_bad_request() {
    let fixture = fixture().await;

    let (result, _, _) = fixture
        .run_action(
            ObjectKind::Stream,
            "home",
            "add",
            Request::post("/stream/home/add"),
            Authorization::user("alice"),
        )
        .await;

    assert_error_status(&result, 400);
}

#[tokio::test]
async fn test_profiles_cannot_hold_templates() {
    let fixture = fixture().await;

    let (result, _, _) = fixture
        .run_action(
            ObjectKind::User,
            "alice",
            "add-stream",
            Request::get("/user/alice/add-stream"),
            Authorization::user("alice"),
        )
        .await;

    assert_error_status(&result, 500);
    assert_eq!(
        result.error,
        Some(PipelineError::Unsupported {
            capability: Capability::Template,
            context: ObjectKind::User,
        })
    );
}
