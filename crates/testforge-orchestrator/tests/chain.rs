//! End-to-end chain behaviour against scripted backends.

use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use testforge_llm::{LlmError, Role, ScriptedBackend, ScriptedReply};
use testforge_orchestrator::{
    CancellationToken, ChainOrchestrator, ChainResult, ChainSettings, ChannelObserver,
    ProgressUpdate, STATUS_COMPLETED, STATUS_FAILED,
};
use testforge_utils::types::StageId;

const SNIPPET: &str = "// Add returns the sum of a and b.\nfunc Add(a, b int) int {\n\treturn a + b\n}";

fn chain(backend: &Arc<ScriptedBackend>, timeout: Duration) -> ChainOrchestrator {
    ChainOrchestrator::new(backend.clone(), ChainSettings::default(), timeout)
}

fn quick(backend: &Arc<ScriptedBackend>) -> ChainOrchestrator {
    chain(backend, Duration::from_secs(5))
}

fn outage() -> ScriptedReply {
    ScriptedReply::Fail(LlmError::ProviderOutage {
        status: 503,
        message: "ollama is restarting".to_string(),
    })
}

fn assert_invariants(result: &ChainResult) {
    assert_eq!(result.errors.is_empty(), result.test_code.is_some());
    assert!(result.errors.len() <= 1);
    if let Some(failed) = result.failed_stage() {
        for stage in StageId::ALL {
            assert_eq!(result.output(stage).is_some(), stage < failed);
        }
    }
}

#[tokio::test]
async fn full_chain_scenario() {
    let backend = Arc::new(ScriptedBackend::with_texts(["ANALYSIS", "CASES", "CODE"]));
    let result = quick(&backend).run(SNIPPET, None).await;

    assert_eq!(result.analysis.as_deref(), Some("ANALYSIS"));
    assert_eq!(result.test_cases.as_deref(), Some("CASES"));
    assert_eq!(result.test_code.as_deref(), Some("CODE"));
    assert!(result.errors.is_empty());
    assert_invariants(&result);
}

#[tokio::test]
async fn second_stage_failure_scenario() {
    let backend = Arc::new(ScriptedBackend::with_texts(["ANALYSIS"]).then(outage()));
    let result = quick(&backend).run(SNIPPET, None).await;

    let value = serde_json::to_value(&result).unwrap();
    let message = result.errors[0].clone();
    assert_eq!(value["analysis"], json!("ANALYSIS"));
    assert_eq!(value["test_cases"], json!(null));
    assert_eq!(value["test_code"], json!(null));
    assert_eq!(value["errors"], json!([message]));
    assert!(message.starts_with("Failed to generate test cases: "));
    assert!(message.contains("503"));
    assert_eq!(backend.call_count(), 2);
    assert_invariants(&result);
}

#[tokio::test]
async fn analysis_failure_stops_everything() {
    let backend = Arc::new(ScriptedBackend::new().then(ScriptedReply::Fail(
        LlmError::ProviderAuth {
            status: 401,
            message: "invalid api key".to_string(),
        },
    )));
    let result = quick(&backend).run(SNIPPET, None).await;

    assert_eq!(result.analysis, None);
    assert_eq!(result.test_cases, None);
    assert_eq!(result.test_code, None);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Failed to perform code analysis: "));
    assert_eq!(backend.call_count(), 1);
    assert!(result.stages.is_empty());
}

#[tokio::test]
async fn third_stage_failure_keeps_earlier_outputs() {
    let backend = Arc::new(
        ScriptedBackend::with_texts(["ANALYSIS", "CASES"]).then(ScriptedReply::Fail(
            LlmError::MalformedResponse("missing message.content".to_string()),
        )),
    );
    let result = quick(&backend).run(SNIPPET, None).await;

    assert_eq!(result.test_cases.as_deref(), Some("CASES"));
    assert_eq!(result.test_code, None);
    assert!(result.errors[0].starts_with("Failed to generate test code: "));
    assert_eq!(result.stages.len(), 2);
    assert_invariants(&result);
}

#[tokio::test]
async fn each_stage_prompt_embeds_previous_output() {
    let backend = Arc::new(ScriptedBackend::with_texts([
        "the function adds two ints",
        "1. zero plus zero\n2. negative numbers",
        "func TestAdd(t *testing.T) {}",
    ]));
    quick(&backend).run(SNIPPET, None).await;

    let calls = backend.invocations();
    assert_eq!(calls.len(), 3);
    for call in &calls {
        assert!(call.content_of(Role::User).contains(SNIPPET));
    }
    assert_eq!(calls[0].stage, StageId::Analysis);
    assert!(calls[1].content_of(Role::User).contains("the function adds two ints"));
    assert!(
        calls[2]
            .content_of(Role::User)
            .contains("1. zero plus zero\n2. negative numbers")
    );
    assert!(!calls[2].content_of(Role::User).contains("the function adds two ints"));
}

#[tokio::test]
async fn deterministic_backend_gives_identical_results() {
    let make = || {
        Arc::new(ScriptedBackend::from_fn(|inv| {
            Ok(format!("{}:{}", inv.stage, inv.content_of(Role::User).len()))
        }))
    };

    let first = quick(&make()).run(SNIPPET, None).await;
    let second = quick(&make()).run(SNIPPET, None).await;

    assert_eq!(first, second);
    assert!(first.is_success());
}

#[tokio::test]
async fn empty_backend_text_counts_as_success() {
    let backend = Arc::new(ScriptedBackend::with_texts(["", "", ""]));
    let result = quick(&backend).run(SNIPPET, None).await;

    assert!(result.is_success());
    assert_eq!(result.test_code.as_deref(), Some(""));
}

#[tokio::test]
async fn stage_timeout_fails_the_stage() {
    let backend = Arc::new(ScriptedBackend::new().then(ScriptedReply::Hang));
    let result = chain(&backend, Duration::from_millis(50)).run(SNIPPET, None).await;

    assert_eq!(result.analysis, None);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Failed to perform code analysis: Timeout"));
}

#[tokio::test]
async fn backend_panic_becomes_unexpected_failure() {
    let backend = Arc::new(
        ScriptedBackend::with_texts(["ANALYSIS"]).then(ScriptedReply::Panic("kaboom".to_string())),
    );
    let result = quick(&backend).run(SNIPPET, None).await;

    assert_eq!(result.analysis.as_deref(), Some("ANALYSIS"));
    assert_eq!(
        result.errors,
        vec!["Failed to generate test cases: unexpected failure: kaboom".to_string()]
    );
}

#[tokio::test]
async fn cancelled_token_prevents_any_call() {
    let backend = Arc::new(ScriptedBackend::with_texts(["ANALYSIS", "CASES", "CODE"]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = quick(&backend).run_with_cancel(SNIPPET, None, cancel).await;

    assert_eq!(backend.call_count(), 0);
    assert_eq!(
        result.errors,
        vec!["Failed to perform code analysis: chain cancelled".to_string()]
    );
}

#[tokio::test]
async fn cancellation_interrupts_in_flight_stage() {
    let backend = Arc::new(ScriptedBackend::with_texts(["ANALYSIS"]).then(ScriptedReply::Hang));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = chain(&backend, Duration::from_secs(30))
        .run_with_cancel(SNIPPET, None, cancel)
        .await;

    assert_eq!(result.analysis.as_deref(), Some("ANALYSIS"));
    assert_eq!(
        result.errors,
        vec!["Failed to generate test cases: chain cancelled".to_string()]
    );
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn channel_observer_reports_failure() {
    let backend = Arc::new(ScriptedBackend::with_texts(["ANALYSIS"]).then(outage()));
    let (observer, mut rx) = ChannelObserver::channel();

    quick(&backend).run(SNIPPET, Some(&observer)).await;

    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    let update = |stage, status: &str| ProgressUpdate {
        stage,
        status: status.to_string(),
    };
    assert_eq!(
        updates,
        vec![
            update(StageId::Analysis, "Analyzing source code"),
            update(StageId::Analysis, STATUS_COMPLETED),
            update(StageId::TestCases, "Generating test cases"),
            update(StageId::TestCases, STATUS_FAILED),
        ]
    );
}

#[tokio::test]
async fn observer_panic_after_completion_does_not_escape() {
    let backend = Arc::new(ScriptedBackend::with_texts(["ANALYSIS", "CASES", "CODE"]));
    let observer = |stage: StageId, status: &str| {
        if stage == StageId::TestCases && status == STATUS_COMPLETED {
            panic!("observer broke");
        }
    };

    let result = quick(&backend).run(SNIPPET, Some(&observer)).await;

    assert!(result.is_success());
    assert_eq!(result.test_code.as_deref(), Some("CODE"));
    assert_eq!(backend.call_count(), 3);
    assert_invariants(&result);
}

#[tokio::test]
async fn observer_panic_at_stage_start_fails_that_stage() {
    let backend = Arc::new(ScriptedBackend::with_texts(["ANALYSIS", "CASES", "CODE"]));
    let observer = |stage: StageId, status: &str| {
        if stage == StageId::TestCases && status != STATUS_COMPLETED && status != STATUS_FAILED {
            panic!("observer broke");
        }
    };

    let result = quick(&backend).run(SNIPPET, Some(&observer)).await;

    assert_eq!(result.analysis.as_deref(), Some("ANALYSIS"));
    assert_eq!(
        result.errors,
        vec![
            "Failed to generate test cases: unexpected failure: progress observer panicked: observer broke"
                .to_string()
        ]
    );
    assert_eq!(backend.call_count(), 1);
    assert_invariants(&result);
}

#[tokio::test]
async fn observer_panicking_on_every_update_yields_one_error() {
    let backend = Arc::new(ScriptedBackend::with_texts(["ANALYSIS", "CASES", "CODE"]));
    let observer = |_: StageId, status: &str| {
        if !status.is_empty() {
            panic!("cannot report {status}");
        }
    };

    let result = quick(&backend).run(SNIPPET, Some(&observer)).await;

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Failed to perform code analysis: unexpected failure"));
    assert_eq!(result.analysis, None);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn dropping_the_run_future_aborts_the_backend_call() {
    let backend = Arc::new(ScriptedBackend::new().then(ScriptedReply::Delayed(
        Duration::from_secs(30),
        "never delivered".to_string(),
    )));
    let orchestrator = chain(&backend, Duration::from_secs(60));

    let outer = tokio::time::timeout(Duration::from_millis(50), orchestrator.run(SNIPPET, None)).await;
    assert!(outer.is_err());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.call_count(), 1);
    // Only this test and the orchestrator still hold the backend.
    assert_eq!(Arc::strong_count(&backend), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn invariants_hold_for_any_outputs(
        snippet in ".{0,200}",
        outputs in proptest::collection::vec(".{0,64}", 3),
        fail_at in 0usize..4,
    ) {
        let backend = Arc::new(ScriptedBackend::new());
        for (i, text) in outputs.iter().enumerate() {
            if i == fail_at {
                backend.push(outage());
            } else {
                backend.push(ScriptedReply::Text(text.clone()));
            }
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = runtime.block_on(quick(&backend).run(&snippet, None));

        assert_invariants(&result);
        prop_assert_eq!(result.is_success(), fail_at == 3);
        for stage in StageId::ALL {
            if stage.index() < fail_at {
                prop_assert_eq!(result.output(stage), Some(outputs[stage.index()].as_str()));
            }
        }
        prop_assert_eq!(backend.call_count(), (fail_at + 1).min(3));
    }
}
