//! Integration tests: units of work and flows, including resume across units.

mod common;

use serde_json::json;

use sdna::{ariadne, human, inject_literal, sdna_flow, sdnac, Context, HermesConfig, MockReply, Status};

use common::{scripted, tagged_unit, texts};

/// **Scenario**: A flow halts at the first failing unit; later units are never called.
#[tokio::test]
async fn flow_halts_at_first_non_success() {
    let (rt, mock) = scripted(vec![
        ("[ONE]", texts(&["first"])),
        ("[TWO]", vec![MockReply::fail("rate limited")]),
        ("[THREE]", texts(&["third"])),
    ]);
    let flow = sdna_flow(
        "pipeline",
        vec![
            tagged_unit("one", "[ONE]", &[]),
            tagged_unit("two", "[TWO] after {text}", &[]),
            tagged_unit("three", "[THREE]", &[]),
        ],
    );
    let out = flow.execute(Context::new(), &rt).await;

    assert_eq!(out.status(), Status::Error);
    assert_eq!(out.resume_path, Some(vec![1]));
    assert_eq!(out.outcome.error_message(), Some("rate limited"));
    assert_eq!(out.context().get("two_ran"), Some(&json!(true)));
    assert_eq!(mock.calls_matching("[ONE]"), 1);
    assert_eq!(mock.calls_matching("[TWO] after first"), 1);
    assert_eq!(mock.calls_matching("[THREE]"), 0);
}

#[tokio::test]
async fn flow_threads_context_forward() {
    let (rt, _mock) = scripted(vec![
        ("[PLAN]", texts(&["<plan>three steps</plan>"])),
        ("[DO]", texts(&["done"])),
    ]);
    let flow = sdna_flow(
        "pipeline",
        vec![
            tagged_unit("planner", "[PLAN]", &["plan"]),
            tagged_unit("doer", "[DO] {plan}", &[]),
        ],
    );
    let out = flow.execute(Context::new().with("seed", 7), &rt).await;
    assert!(out.is_success());
    assert_eq!(out.resume_path, None);
    let ctx = out.context();
    assert_eq!(ctx.get_str("plan"), Some("three steps"));
    assert_eq!(ctx.get_str("text"), Some("done"));
    assert_eq!(ctx.get("seed"), Some(&json!(7)));
}

/// **Scenario**: A flow suspended in its second unit resumes there and finishes the rest.
#[tokio::test]
async fn flow_resumes_inside_halted_unit() {
    let (rt, mock) = scripted(vec![
        ("[A]", texts(&["alpha"])),
        ("[B]", texts(&["beta"])),
        ("[C]", texts(&["gamma"])),
    ]);
    let gated = sdnac(
        "b",
        ariadne(
            "b_prep",
            vec![inject_literal("x", 1), human("Audience?", "audience", None), inject_literal("y", 2)],
        ),
        HermesConfig::new("b", "[B] for {audience}"),
    );
    let flow = sdna_flow(
        "pipeline",
        vec![tagged_unit("a", "[A]", &[]), gated, tagged_unit("c", "[C]", &[])],
    );

    let paused = flow.execute(Context::new(), &rt).await;
    assert_eq!(paused.status(), Status::AwaitingInput);
    assert_eq!(paused.resume_path, Some(vec![1]));
    let pending = paused.outcome.pending().cloned().unwrap();
    assert_eq!(pending.resume_at, 2);
    assert_eq!(mock.calls_matching("[B]"), 0);

    let resume_path = paused.resume_path.clone().unwrap();
    let done = flow
        .resume(
            pending.answer(paused.outcome.into_context(), "engineers"),
            &resume_path,
            pending.resume_at,
            &rt,
        )
        .await;
    assert!(done.is_success());
    assert_eq!(mock.calls_matching("[A]"), 1);
    assert_eq!(mock.calls_matching("[B] for engineers"), 1);
    assert_eq!(mock.calls_matching("[C]"), 1);
    assert_eq!(done.context().get("y"), Some(&json!(2)));
    assert_eq!(done.context().get_str("text"), Some("gamma"));
}

#[tokio::test]
async fn unit_template_error_skips_generation() {
    let (rt, mock) = scripted(vec![]);
    let unit = tagged_unit("u", "Needs {undefined_var}", &[]);
    let out = unit.execute(Context::new(), &rt).await;
    assert_eq!(out.status(), Status::Error);
    assert!(out.error_message().unwrap().contains("undefined_var"));
    assert_eq!(mock.calls(), 0);
    assert_eq!(out.context().get("u_ran"), Some(&json!(true)));
}
