//! Test: a compiled action mixing response, control-flow and view steps

use crate::helpers::*;
use actionpipe::Request;

const ACTION: &str = r#"
- step: set-header
  name: X-Test
  value: "1"
- step: if
  condition: "false"
  then:
    - step: halt
- step: view-fragment
  file: profile-view
"#;

#[tokio::test]
async fn test_header_branch_and_view() {
    let fixture = fixture().await;
    let pipeline = compile(ACTION);
    assert_eq!(pipeline.kinds(), vec!["set-header", "if", "view-fragment"]);

    let (result, sink) = run_on_profile(&fixture, &pipeline, Request::get("/user/alice")).await;

    assert_clean(&result);
    assert_eq!(result.headers["X-Test"], "1");
    assert!(!result.halt);
    assert_eq!(sink, "<h1>Alice</h1>");
}

#[tokio::test]
async fn test_write_phase_skips_view() {
    let fixture = fixture().await;
    let pipeline = compile(ACTION);

    let (result, sink) = run_on_profile(&fixture, &pipeline, Request::post("/user/alice")).await;

    assert_clean(&result);
    assert_eq!(result.headers["X-Test"], "1");
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_true_branch_halts_before_view() {
    let fixture = fixture().await;
    let pipeline = compile(&ACTION.replace("\"false\"", "\"true\""));

    let (result, sink) = run_on_profile(&fixture, &pipeline, Request::get("/user/alice")).await;

    assert_clean(&result);
    assert!(result.halt);
    assert_eq!(result.headers["X-Test"], "1");
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_redirect_only_on_write() {
    let fixture = fixture().await;
    let pipeline = compile(
        r#"
- step: redirect-to
  url: "/user/{{ objectId }}/rules"
- step: view-fragment
  file: profile-view
"#,
    );

    let (result, sink) = run_on_profile(&fixture, &pipeline, Request::get("/user/alice")).await;
    assert!(!result.headers.contains_key("HX-Redirect"));
    assert_eq!(sink, "<h1>Alice</h1>");

    let (result, _) = run_on_profile(&fixture, &pipeline, Request::post("/user/alice")).await;
    assert!(result.halt);
    assert_eq!(result.headers["HX-Redirect"], "/user/alice/rules");
}
