//! Test: exactly one branch of an `if` runs, and its verdict propagates

use crate::helpers::*;
use actionpipe::core::condition::Condition;
use actionpipe::steps::control::IfStep;
use actionpipe::{Pipeline, PipelineBehavior, PipelineError, Request, Step};

fn branch(condition: &str, then: ScriptedStep, otherwise: ScriptedStep) -> Pipeline {
    let step = IfStep::new(
        Condition::compile(condition).expect("condition compiles"),
        scripted(vec![then]),
        scripted(vec![otherwise]),
    );
    Pipeline::new(vec![Box::new(step) as Box<dyn Step>])
}

#[tokio::test]
async fn test_only_the_matching_branch_runs() {
    let fixture = fixture().await;

    for (condition, expected) in [
        ("true", (1, 0)),
        ("false", (0, 1)),
        ("user.author", (1, 0)),
        ("object.displayName == \"Bob\"", (0, 1)),
    ] {
        let then = ScriptedStep::new("then", PipelineBehavior::proceed().with_header("X-Branch", "then"));
        let otherwise = ScriptedStep::new("else", PipelineBehavior::proceed().with_header("X-Branch", "else"));
        let (t, o) = (then.counter(), otherwise.counter());

        let pipeline = branch(condition, then, otherwise);
        let (result, _) = run_on_profile(&fixture, &pipeline, Request::get("/user/alice")).await;

        assert_eq!((calls(&t), calls(&o)), expected, "condition '{}'", condition);
        let taken = if expected.0 == 1 { "then" } else { "else" };
        assert_eq!(result.headers["X-Branch"], taken);
    }
}

#[tokio::test]
async fn test_branch_halt_stops_enclosing_pipeline() {
    let fixture = fixture().await;
    let inner = branch(
        "true",
        ScriptedStep::new("stop", PipelineBehavior::halt()),
        ScriptedStep::new("never", PipelineBehavior::Pass),
    );
    let after = ScriptedStep::new("after", PipelineBehavior::Pass);
    let counter = after.counter();

    let mut steps: Vec<Box<dyn Step>> = Vec::new();
    steps.push(Box::new(IfStep::new(
        Condition::compile("true").expect("condition compiles"),
        inner,
        Pipeline::default(),
    )));
    steps.push(Box::new(after));
    let pipeline = Pipeline::new(steps);

    let (result, _) = run_on_profile(&fixture, &pipeline, Request::post("/user/alice")).await;

    assert!(result.halt);
    assert_clean(&result);
    assert_eq!(calls(&counter), 0);
}

#[tokio::test]
async fn test_branch_error_propagates() {
    let fixture = fixture().await;
    let pipeline = branch(
        "user.authenticated",
        ScriptedStep::new("fails", PipelineBehavior::halt_error(PipelineError::forbidden("no"))),
        ScriptedStep::new("never", PipelineBehavior::Pass),
    );

    let (result, _) = run_on_profile(&fixture, &pipeline, Request::get("/user/alice")).await;

    assert_error_status(&result, 403);
}

#[tokio::test]
async fn test_if_from_config_reads_scratch_values() {
    let fixture = fixture().await;
    let pipeline = compile(
        r#"
- step: set-string
  name: mode
  value: "{{ object.displayName }}"
- step: if
  condition: data.mode == "Alice"
  then:
    - step: set-header
      name: X-Greeting
      value: "hello {{ data.mode }}"
  else:
    - step: halt
"#,
    );

    let (result, _) = run_on_profile(&fixture, &pipeline, Request::get("/user/alice")).await;

    assert!(!result.halt);
    assert_eq!(result.headers["X-Greeting"], "hello Alice");
}
