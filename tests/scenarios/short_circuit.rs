//! Test: a halt or an error stops the pipeline at that step

use crate::helpers::*;
use actionpipe::core::record::ObjectKind;
use actionpipe::{Authorization, PipelineBehavior, PipelineError, PipelineResult, Request};

#[tokio::test]
async fn test_halt_skips_remaining_steps() {
    let fixture = fixture().await;
    let s1 = ScriptedStep::new("s1", PipelineBehavior::proceed().with_header("X-Test", "1")).writing("<a/>");
    let s2 = ScriptedStep::new("s2", PipelineBehavior::halt().with_status(204)).writing("<b/>");
    let s3 = ScriptedStep::new("s3", PipelineBehavior::proceed().with_header("X-Late", "1")).writing("<c/>");
    let (c1, c2, c3) = (s1.counter(), s2.counter(), s3.counter());

    let pipeline = scripted(vec![s1, s2, s3]);
    let (result, sink) = run_on_profile(&fixture, &pipeline, Request::get("/user/alice")).await;

    assert_eq!((calls(&c1), calls(&c2), calls(&c3)), (1, 1, 0));
    assert_eq!(sink, "<a/><b/>");

    let mut expected = PipelineResult::new();
    expected.merge(PipelineBehavior::proceed().with_header("X-Test", "1").into_parts().0);
    expected.merge(PipelineBehavior::halt().with_status(204).into_parts().0);
    assert_eq!(result, expected);
    assert!(result.halt);
}

#[tokio::test]
async fn test_error_halts_even_without_halt_verdict() {
    let fixture = fixture().await;
    let mut failing = PipelineResult::new();
    failing.error = Some(PipelineError::bad_request("broken input"));

    let after = ScriptedStep::new("after", PipelineBehavior::Pass);
    let counter = after.counter();
    let pipeline = scripted(vec![
        ScriptedStep::new("fails", PipelineBehavior::Continue(failing)),
        after,
    ]);

    let (result, _) = run_on_profile(&fixture, &pipeline, Request::post("/user/alice")).await;

    assert_error_status(&result, 400);
    assert_eq!(calls(&counter), 0);
}

#[tokio::test]
async fn test_unknown_step_halts_with_diagnostic() {
    let fixture = fixture().await;

    let (result, sink, _) = fixture
        .run_action(
            ObjectKind::User,
            "alice",
            "broken",
            Request::get("/user/alice/broken"),
            Authorization::Anonymous,
        )
        .await;

    assert_error_status(&result, 500);
    let message = result.error.map(|e| e.to_string()).unwrap_or_default();
    assert!(message.contains("teleport"));
    assert!(message.contains("broken"));
    assert!(message.contains("alice"));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_step_after_failed_validation_does_not_run() {
    let fixture = fixture().await;
    let pipeline = compile(
        r#"
- step: set-data
  values:
    displayName: Alicia
- step: set-data
  values:
    nickname: Al
- step: set-header
  name: X-Never
  value: "1"
"#,
    );

    let (result, _) = run_on_profile(&fixture, &pipeline, Request::post("/user/alice")).await;

    assert_error_status(&result, 400);
    assert!(!result.headers.contains_key("X-Never"));
}
