//! Test: step results fold into one accumulated result
//!
//! Flags OR together, scalars keep their first explicit value, headers and
//! events keep their first writer, and the last error wins.

use crate::helpers::*;
use actionpipe::{PipelineBehavior, PipelineError, PipelineResult, Request};

#[tokio::test]
async fn test_pass_contributes_nothing() {
    let fixture = fixture().await;
    let pipeline = scripted(vec![
        ScriptedStep::new("a", PipelineBehavior::Pass),
        ScriptedStep::new("b", PipelineBehavior::proceed()),
    ]);

    let (result, sink) = run_on_profile(&fixture, &pipeline, Request::get("/user/alice")).await;

    assert_eq!(result, PipelineResult::new());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_first_explicit_scalar_wins() {
    let fixture = fixture().await;
    let pipeline = scripted(vec![
        ScriptedStep::new("blank", PipelineBehavior::proceed()),
        ScriptedStep::new(
            "first",
            PipelineBehavior::proceed()
                .with_status(201)
                .with_content_type("application/json"),
        ),
        ScriptedStep::new(
            "second",
            PipelineBehavior::proceed()
                .with_status(202)
                .with_content_type("text/plain"),
        ),
    ]);

    let (result, _) = run_on_profile(&fixture, &pipeline, Request::get("/user/alice")).await;

    assert_eq!(result.status_code, 201);
    assert_eq!(result.content_type, "application/json");
    assert!(!result.halt);
}

#[tokio::test]
async fn test_headers_and_events_keep_first_writer() {
    let fixture = fixture().await;
    let pipeline = scripted(vec![
        ScriptedStep::new(
            "first",
            PipelineBehavior::proceed()
                .with_header("X-Test", "1")
                .with_event("saved", "first"),
        ),
        ScriptedStep::new(
            "second",
            PipelineBehavior::proceed()
                .with_header("X-Test", "2")
                .with_header("X-Other", "yes")
                .with_event("saved", "second")
                .with_event("closeModal", ""),
        ),
    ]);

    let (result, _) = run_on_profile(&fixture, &pipeline, Request::post("/user/alice")).await;

    assert_eq!(result.headers["X-Test"], "1");
    assert_eq!(result.headers["X-Other"], "yes");
    assert_eq!(result.events["saved"], "first");
    assert!(result.events.contains_key("closeModal"));
}

#[tokio::test]
async fn test_flags_are_sticky() {
    let fixture = fixture().await;
    let pipeline = scripted(vec![
        ScriptedStep::new("page", PipelineBehavior::proceed().as_full_page()),
        ScriptedStep::new("plain", PipelineBehavior::proceed().with_status(200)),
    ]);

    let (result, _) = run_on_profile(&fixture, &pipeline, Request::get("/user/alice")).await;

    assert!(result.full_page);
    assert_eq!(result.status_code, 200);
}

#[test]
fn test_last_error_wins() {
    let mut result = PipelineResult::failed(PipelineError::not_found("first"));
    result.merge(PipelineResult::new());
    assert_eq!(result.error, Some(PipelineError::not_found("first")));

    result.merge(PipelineResult::failed(PipelineError::forbidden("second")));
    assert_eq!(result.error, Some(PipelineError::forbidden("second")));
    assert!(result.halt);
}
