//! End-to-end orchestration tests.
//!
//! These tests run the full path: task registration, plan resolution,
//! staged concurrent execution, and aggregation into the final
//! document.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use folio::core::{ExecutionPlan, TaskGraph, TaskResult};
use folio::manifest::Manifest;
use folio::orchestration::{aggregate, Executor, ExecutorConfig};
use folio::provider::{ContentProvider, DegradedProvider, ProviderRegistry};

use crate::fixtures::{diamond_tasks, fast_config, run_tasks, task, Behavior, ScriptedProvider};

/// The acceptance diamond: plan stages are [{a}], [{b, c}], [{d}];
/// A's content "x" reaches B and C as input.
#[tokio::test]
async fn test_diamond_staging_and_input_propagation() {
    let graph = TaskGraph::from_tasks(diamond_tasks()).unwrap();
    let plan = ExecutionPlan::resolve(&graph).unwrap();

    assert_eq!(plan.stage_count(), 3);
    assert_eq!(plan.stages()[0].members(), &["a"]);
    assert_eq!(plan.stages()[1].members(), &["b", "c"]);
    assert_eq!(plan.stages()[2].members(), &["d"]);

    let provider =
        Arc::new(ScriptedProvider::new().behave("a", Behavior::Success("x".to_string())));
    let outcome = run_tasks(diamond_tasks(), provider.clone(), fast_config()).await;

    assert!(outcome.is_complete_success());
    let expected: HashMap<String, String> = [("a".to_string(), "x".to_string())].into();
    assert_eq!(provider.inputs_for("b"), Some(expected.clone()));
    assert_eq!(provider.inputs_for("c"), Some(expected));

    // D received both B's and C's content
    let d_inputs = provider.inputs_for("d").unwrap();
    assert_eq!(d_inputs.len(), 2);
    assert_eq!(d_inputs["b"], "content:b");
    assert_eq!(d_inputs["c"], "content:c");
}

/// Three independent tasks in one stage all start concurrently; one
/// task's latency does not delay the others' start.
#[tokio::test]
async fn test_independent_tasks_start_together() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .behave(
                "slow",
                Behavior::Sleep {
                    delay: Duration::from_millis(150),
                    content: "slow content".to_string(),
                },
            )
            .behave(
                "fast1",
                Behavior::Sleep {
                    delay: Duration::from_millis(10),
                    content: "f1".to_string(),
                },
            )
            .behave(
                "fast2",
                Behavior::Sleep {
                    delay: Duration::from_millis(10),
                    content: "f2".to_string(),
                },
            ),
    );

    let start = Instant::now();
    let outcome = run_tasks(
        vec![task("slow", &[]), task("fast1", &[]), task("fast2", &[])],
        provider.clone(),
        fast_config(),
    )
    .await;
    let elapsed = start.elapsed();

    assert!(outcome.is_complete_success());
    // Whole stage bounded by the slowest member, not the sum
    assert!(
        elapsed < Duration::from_millis(300),
        "stage should run concurrently, took {:?}",
        elapsed
    );

    // All three were launched within a narrow window
    let starts = [
        provider.started_at("slow").unwrap(),
        provider.started_at("fast1").unwrap(),
        provider.started_at("fast2").unwrap(),
    ];
    let earliest = starts.iter().min().unwrap();
    let latest = starts.iter().max().unwrap();
    assert!(
        latest.duration_since(*earliest) < Duration::from_millis(100),
        "all stage members should start together"
    );
}

/// Aggregation is order-independent: two runs that settle in different
/// orders but end with the same terminal results produce byte-identical
/// documents.
#[tokio::test]
async fn test_aggregation_order_independent() {
    let template = folio::orchestration::DocumentTemplate::new("Doc")
        .with_slot("a", "Section A")
        .with_slot("b", "Section B");

    // Run 1: a settles last
    let provider1 = Arc::new(
        ScriptedProvider::new()
            .behave(
                "a",
                Behavior::Sleep {
                    delay: Duration::from_millis(80),
                    content: "a content".to_string(),
                },
            )
            .behave("b", Behavior::Success("b content".to_string())),
    );
    let outcome1 = run_tasks(vec![task("a", &[]), task("b", &[])], provider1, fast_config()).await;

    // Run 2: b settles last
    let provider2 = Arc::new(
        ScriptedProvider::new()
            .behave("a", Behavior::Success("a content".to_string()))
            .behave(
                "b",
                Behavior::Sleep {
                    delay: Duration::from_millis(80),
                    content: "b content".to_string(),
                },
            ),
    );
    let outcome2 = run_tasks(vec![task("a", &[]), task("b", &[])], provider2, fast_config()).await;

    assert_eq!(outcome1.results, outcome2.results);
    let doc1 = aggregate(&outcome1.results, &template);
    let doc2 = aggregate(&outcome2.results, &template);
    assert_eq!(doc1.markdown, doc2.markdown);
}

/// Cancellation mid-run: in-flight tasks settle cooperatively, unstarted
/// tasks are skipped, and the partial results still aggregate.
#[tokio::test]
async fn test_cancellation_aggregates_partial_results() {
    let tasks = vec![
        task("first", &[]),
        task("slow", &["first"]),
        task("last", &["slow"]),
    ];
    let provider = Arc::new(ScriptedProvider::new().behave(
        "slow",
        Behavior::Sleep {
            delay: Duration::from_secs(5),
            content: "never".to_string(),
        },
    ));

    let graph = TaskGraph::from_tasks(tasks).unwrap();
    let plan = ExecutionPlan::resolve(&graph).unwrap();
    let registry = Arc::new(ProviderRegistry::new(
        provider.clone() as Arc<dyn ContentProvider>
    ));
    let executor = Executor::new(registry, fast_config());

    let token = executor.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let start = Instant::now();
    let outcome = executor.execute(&plan, &graph.task_map()).await.unwrap();
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "cancellation should interrupt the in-flight sleep"
    );

    assert!(outcome.report.cancelled);
    assert!(outcome.results["first"].is_success());
    assert!(matches!(
        &outcome.results["slow"],
        TaskResult::Skipped { reason } if reason == "run cancelled"
    ));
    assert!(matches!(
        &outcome.results["last"],
        TaskResult::Skipped { reason } if reason == "run cancelled"
    ));

    // Every declared slot still appears in the aggregate
    let template = folio::orchestration::DocumentTemplate::new("Doc")
        .with_slot("first", "First")
        .with_slot("slow", "Slow")
        .with_slot("last", "Last");
    let doc = aggregate(&outcome.results, &template);
    assert!(doc.markdown.contains("content:first"));
    assert_eq!(
        doc.markdown
            .matches("[section unavailable: skipped: run cancelled]")
            .count(),
        2
    );
}

/// Full manifest-driven run against the degraded provider: every
/// declared section produces content and appears under its heading.
#[tokio::test]
async fn test_manifest_run_with_degraded_provider() {
    let manifest = Manifest::default_architecture("Payments Platform");
    let graph = TaskGraph::from_tasks(manifest.tasks()).unwrap();
    let plan = ExecutionPlan::resolve(&graph).unwrap();

    let registry = Arc::new(ProviderRegistry::new(Arc::new(DegradedProvider::new())));
    let executor = Executor::new(registry, ExecutorConfig::default());
    let outcome = executor.execute(&plan, &graph.task_map()).await.unwrap();

    assert!(outcome.is_complete_success());
    assert_eq!(outcome.report.succeeded, 6);

    let doc = aggregate(&outcome.results, &manifest.document_template());
    assert!(doc.markdown.starts_with("# Payments Platform\n"));
    for heading in [
        "Project Background",
        "Application Architecture",
        "Service Division",
        "Code Structure",
        "Database Design",
        "Upstream and Downstream Systems",
    ] {
        assert!(
            doc.markdown.contains(&format!("## {}", heading)),
            "missing heading: {}",
            heading
        );
    }
    assert!(!doc.markdown.contains("section unavailable"));
}

/// Stage barrier: a stage-2 task never starts before every stage-1
/// task has settled.
#[tokio::test]
async fn test_stage_barrier_orders_cross_stage_starts() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .behave(
                "up1",
                Behavior::Sleep {
                    delay: Duration::from_millis(120),
                    content: "u1".to_string(),
                },
            )
            .behave("up2", Behavior::Success("u2".to_string())),
    );

    let outcome = run_tasks(
        vec![
            task("up1", &[]),
            task("up2", &[]),
            task("down", &["up1", "up2"]),
        ],
        provider.clone(),
        fast_config(),
    )
    .await;

    assert!(outcome.is_complete_success());
    let up1_start = provider.started_at("up1").unwrap();
    let down_start = provider.started_at("down").unwrap();
    assert!(
        down_start.duration_since(up1_start) >= Duration::from_millis(120),
        "downstream must wait for the slowest upstream"
    );
}
