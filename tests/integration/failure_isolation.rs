//! Failure isolation, retry, and skip propagation tests.

use std::sync::Arc;
use std::time::Duration;

use folio::core::{ExecutionPlan, TaskGraph, TaskResult};
use folio::orchestration::{aggregate, DocumentTemplate, Executor, ExecutorConfig, RetryPolicy};
use folio::provider::{ContentProvider, ProviderRegistry};

use crate::fixtures::{diamond_tasks, fast_config, run_tasks, task, Behavior, ScriptedProvider};

/// The acceptance scenario: C fails permanently, so D is skipped and
/// D's provider is never invoked. A and B are unaffected.
#[tokio::test]
async fn test_permanent_failure_skips_dependent_only() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .behave("c", Behavior::FailPermanent("invalid request".to_string())),
    );

    let outcome = run_tasks(diamond_tasks(), provider.clone(), fast_config()).await;

    assert!(outcome.results["a"].is_success());
    assert!(outcome.results["b"].is_success());
    assert!(matches!(
        &outcome.results["c"],
        TaskResult::Failed { error } if error == "invalid request"
    ));
    assert!(matches!(
        &outcome.results["d"],
        TaskResult::Skipped { reason } if reason == "upstream dependency failed: c"
    ));

    assert_eq!(provider.call_count("c"), 1, "permanent errors never retry");
    assert_eq!(provider.call_count("d"), 0, "skipped tasks never invoke the provider");
    assert_eq!(outcome.report.failed, 1);
    assert_eq!(outcome.report.skipped, 1);
}

/// A task whose provider always fails transiently retries exactly
/// `max_attempts` times, then fails; its siblings still succeed.
#[tokio::test]
async fn test_transient_exhaustion_is_bounded() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .behave("bad", Behavior::FailTransient("service overloaded".to_string())),
    );

    let outcome = run_tasks(
        vec![task("bad", &[]), task("good", &[])],
        provider.clone(),
        fast_config(),
    )
    .await;

    assert_eq!(provider.call_count("bad"), 3);
    assert_eq!(outcome.report.attempts["bad"], 3);
    assert!(matches!(
        &outcome.results["bad"],
        TaskResult::Failed { error } if error.contains("after 3 attempt(s)")
    ));
    assert!(outcome.results["good"].is_success());
}

/// A transient failure that recovers within the retry budget ends in
/// success.
#[tokio::test]
async fn test_transient_recovery_within_budget() {
    let provider = Arc::new(ScriptedProvider::new().behave(
        "flaky",
        Behavior::FlakyThenSuccess {
            failures: 2,
            content: "recovered".to_string(),
        },
    ));

    let outcome = run_tasks(vec![task("flaky", &[])], provider.clone(), fast_config()).await;

    assert_eq!(provider.call_count("flaky"), 3);
    assert_eq!(outcome.results["flaky"].content(), Some("recovered"));
}

/// A task exceeding the per-attempt timeout on every attempt fails
/// with a timeout-classified reason after the configured retry count.
#[tokio::test]
async fn test_timeout_exhaustion_fails_with_timeout_reason() {
    let provider = Arc::new(ScriptedProvider::new().behave(
        "stuck",
        Behavior::Sleep {
            delay: Duration::from_millis(300),
            content: "never".to_string(),
        },
    ));

    let graph = TaskGraph::from_tasks(vec![task("stuck", &[])]).unwrap();
    let plan = ExecutionPlan::resolve(&graph).unwrap();
    let registry = Arc::new(ProviderRegistry::new(
        provider.clone() as Arc<dyn ContentProvider>
    ));
    let config = ExecutorConfig {
        retry: RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
        attempt_timeout: Duration::from_millis(30),
        stage_concurrency: None,
    };
    let executor = Executor::new(registry, config);

    let outcome = executor.execute(&plan, &graph.task_map()).await.unwrap();

    assert_eq!(provider.call_count("stuck"), 2);
    assert_eq!(outcome.report.attempts["stuck"], 2);
    assert!(matches!(
        &outcome.results["stuck"],
        TaskResult::Failed { error } if error.contains("timed out")
    ));
}

/// Skips cascade down a chain: each dependent names its own blocking
/// upstream, not the original failure.
#[tokio::test]
async fn test_skip_cascade_names_direct_blocker() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .behave("root", Behavior::FailPermanent("boom".to_string())),
    );

    let outcome = run_tasks(
        vec![
            task("root", &[]),
            task("mid", &["root"]),
            task("leaf", &["mid"]),
        ],
        provider.clone(),
        fast_config(),
    )
    .await;

    assert!(matches!(
        &outcome.results["mid"],
        TaskResult::Skipped { reason } if reason == "upstream dependency failed: root"
    ));
    assert!(matches!(
        &outcome.results["leaf"],
        TaskResult::Skipped { reason } if reason == "upstream dependency failed: mid"
    ));
    assert_eq!(provider.call_count("mid"), 0);
    assert_eq!(provider.call_count("leaf"), 0);
}

/// Partial failure is visible in the final document: failed and
/// skipped slots render placeholders, successful slots render content.
#[tokio::test]
async fn test_partial_failure_visible_in_document() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .behave("c", Behavior::FailPermanent("invalid request".to_string())),
    );
    let outcome = run_tasks(diamond_tasks(), provider, fast_config()).await;

    let template = DocumentTemplate::new("Doc")
        .with_slot("a", "A")
        .with_slot("b", "B")
        .with_slot("c", "C")
        .with_slot("d", "D");
    let doc = aggregate(&outcome.results, &template);

    assert!(doc.markdown.contains("content:a"));
    assert!(doc.markdown.contains("content:b"));
    assert!(doc
        .markdown
        .contains("[section unavailable: generation failed: invalid request]"));
    assert!(doc
        .markdown
        .contains("[section unavailable: skipped: upstream dependency failed: c]"));
    // All four headings survive
    for heading in ["## A", "## B", "## C", "## D"] {
        assert!(doc.markdown.contains(heading));
    }
}

/// Resolution errors abort before any task executes.
#[tokio::test]
async fn test_cycle_aborts_before_execution() {
    let result = TaskGraph::from_tasks(vec![task("a", &["b"]), task("b", &["a"])])
        .and_then(|graph| ExecutionPlan::resolve(&graph));

    assert!(matches!(
        result,
        Err(folio::Error::CycleDetected { tasks }) if tasks == vec!["a", "b"]
    ));
}

/// An unknown dependency is reported with both the referencing task
/// and the missing name.
#[tokio::test]
async fn test_unknown_dependency_reported() {
    let result = TaskGraph::from_tasks(vec![task("a", &[]), task("b", &["ghost"])]);

    match result {
        Err(folio::Error::UnknownDependency { task, dependency }) => {
            assert_eq!(task, "b");
            assert_eq!(dependency, "ghost");
        }
        other => panic!("Expected UnknownDependency, got {:?}", other.map(|_| ())),
    }
}
