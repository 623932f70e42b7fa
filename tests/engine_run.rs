// tests/engine_run.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use pipedag::action::ExecutionError;
use pipedag::dag::{TaskGraph, TaskSpec, TaskState};
use pipedag::engine::{Engine, EngineOptions, RunReport, RunStatus};

use pipedag_test_utils::builders::{build_graph, fast_retry, spec};
use pipedag_test_utils::fake_action::{GaugeAction, ScriptedAction, WaitForCancelAction};
use pipedag_test_utils::fake_warehouse::FakeWarehouse;
use pipedag_test_utils::{init_tracing, with_timeout};

async fn run_engine(graph: TaskGraph, options: EngineOptions) -> RunReport {
    let warehouse = Arc::new(FakeWarehouse::new());
    let engine = Engine::new(graph, options, warehouse);
    with_timeout(engine.run()).await
}

#[tokio::test]
async fn simple_chain_runs_in_dependency_order() {
    init_tracing();

    let log = Arc::new(Mutex::new(Vec::new()));
    let graph = build_graph(
        vec![
            spec("a", Arc::new(ScriptedAction::succeeding("a").with_log(log.clone()))),
            spec("b", Arc::new(ScriptedAction::succeeding("b").with_log(log.clone()))),
            spec("c", Arc::new(ScriptedAction::succeeding("c").with_log(log.clone()))),
        ],
        &[("a", "b"), ("b", "c")],
    );

    let report = run_engine(graph, EngineOptions::default()).await;

    assert_eq!(report.status, RunStatus::Succeeded);
    for id in ["a", "b", "c"] {
        assert_eq!(report.task(id).unwrap().state, TaskState::Succeeded);
    }

    let order = log.lock().unwrap().clone();
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn terminal_failure_skips_all_downstream_tasks() {
    init_tracing();

    let graph = build_graph(
        vec![
            spec(
                "a",
                Arc::new(ScriptedAction::always_failing(
                    "a",
                    ExecutionError::Failed("boom".to_string()),
                )),
            ),
            spec("b", Arc::new(ScriptedAction::succeeding("b"))),
            spec("c", Arc::new(ScriptedAction::succeeding("c"))),
        ],
        &[("a", "b"), ("b", "c")],
    );

    let report = run_engine(graph, EngineOptions::default()).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.task("a").unwrap().state, TaskState::Failed);
    assert_eq!(report.task("b").unwrap().state, TaskState::Skipped);
    assert_eq!(report.task("c").unwrap().state, TaskState::Skipped);

    // Skip reasons name the immediate upstream cause.
    assert!(report.task("b").unwrap().error.as_deref().unwrap().contains("'a'"));
    assert!(report.task("c").unwrap().error.as_deref().unwrap().contains("'b'"));

    // Skipped tasks never ran.
    assert_eq!(report.task("b").unwrap().attempts, 0);
    assert_eq!(report.task("c").unwrap().attempts, 0);
}

#[tokio::test]
async fn fan_in_is_skipped_when_one_branch_fails() {
    init_tracing();

    let d_action = Arc::new(ScriptedAction::succeeding("d"));
    let graph = build_graph(
        vec![
            spec("a", Arc::new(ScriptedAction::succeeding("a"))),
            spec(
                "b",
                Arc::new(ScriptedAction::always_failing(
                    "b",
                    ExecutionError::Failed("branch b down".to_string()),
                )),
            ),
            spec("c", Arc::new(ScriptedAction::succeeding("c"))),
            spec("d", d_action.clone()),
        ],
        &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
    );

    let report = run_engine(graph, EngineOptions::default()).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.task("a").unwrap().state, TaskState::Succeeded);
    assert_eq!(report.task("b").unwrap().state, TaskState::Failed);
    assert_eq!(report.task("c").unwrap().state, TaskState::Succeeded);
    assert_eq!(report.task("d").unwrap().state, TaskState::Skipped);
    assert_eq!(d_action.invocations(), 0);
}

#[tokio::test]
async fn independent_branch_is_unaffected_by_failure() {
    init_tracing();

    let graph = build_graph(
        vec![
            spec(
                "broken",
                Arc::new(ScriptedAction::always_failing(
                    "broken",
                    ExecutionError::Failed("nope".to_string()),
                )),
            ),
            spec("broken_child", Arc::new(ScriptedAction::succeeding("broken_child"))),
            spec("healthy", Arc::new(ScriptedAction::succeeding("healthy"))),
            spec("healthy_child", Arc::new(ScriptedAction::succeeding("healthy_child"))),
        ],
        &[("broken", "broken_child"), ("healthy", "healthy_child")],
    );

    let report = run_engine(graph, EngineOptions::default()).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.task("broken_child").unwrap().state, TaskState::Skipped);
    assert_eq!(report.task("healthy").unwrap().state, TaskState::Succeeded);
    assert_eq!(
        report.task("healthy_child").unwrap().state,
        TaskState::Succeeded
    );
}

#[tokio::test]
async fn retryable_failure_is_retried_until_success() {
    init_tracing();

    let action = Arc::new(ScriptedAction::failing_then_succeeding(
        "flaky",
        2,
        ExecutionError::Failed("transient".to_string()),
    ));
    let counter = action.invocation_counter();

    let graph = build_graph(
        vec![TaskSpec::new("flaky", action).with_retry(fast_retry(2))],
        &[],
    );

    let report = run_engine(graph, EngineOptions::default()).await;

    assert_eq!(report.status, RunStatus::Succeeded);
    let task = report.task("flaky").unwrap();
    assert_eq!(task.state, TaskState::Succeeded);
    assert_eq!(task.attempts, 3);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_are_bounded_by_the_limit() {
    init_tracing();

    let action = Arc::new(ScriptedAction::always_failing(
        "stubborn",
        ExecutionError::Failed("still broken".to_string()),
    ));
    let counter = action.invocation_counter();

    let graph = build_graph(
        vec![TaskSpec::new("stubborn", action).with_retry(fast_retry(2))],
        &[],
    );

    let report = run_engine(graph, EngineOptions::default()).await;

    assert_eq!(report.status, RunStatus::Failed);
    let task = report.task("stubborn").unwrap();
    assert_eq!(task.state, TaskState::Failed);
    // First attempt + 2 retries.
    assert_eq!(task.attempts, 3);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(task.error.as_deref(), Some("still broken"));
}

#[tokio::test]
async fn validation_errors_are_never_retried() {
    init_tracing();

    let action = Arc::new(ScriptedAction::always_failing(
        "checks",
        ExecutionError::Validation("42 rows, expected 0".to_string()),
    ));
    let counter = action.invocation_counter();

    let graph = build_graph(
        vec![TaskSpec::new("checks", action).with_retry(fast_retry(5))],
        &[],
    );

    let report = run_engine(graph, EngineOptions::default()).await;

    assert_eq!(report.status, RunStatus::Failed);
    let task = report.task("checks").unwrap();
    assert_eq!(task.state, TaskState::Failed);
    assert_eq!(task.attempts, 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn worker_pool_bound_is_respected() {
    init_tracing();

    let current = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let specs: Vec<TaskSpec> = (0..4)
        .map(|i| {
            spec(
                &format!("gauge_{i}"),
                Arc::new(GaugeAction::new(
                    current.clone(),
                    max_seen.clone(),
                    Duration::from_millis(20),
                )),
            )
        })
        .collect();

    let options = EngineOptions {
        max_parallel_tasks: Some(1),
        ..EngineOptions::default()
    };
    let report = run_engine(build_graph(specs, &[]), options).await;

    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unbounded_pool_overlaps_independent_tasks() {
    init_tracing();

    let current = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let specs: Vec<TaskSpec> = (0..4)
        .map(|i| {
            spec(
                &format!("gauge_{i}"),
                Arc::new(GaugeAction::new(
                    current.clone(),
                    max_seen.clone(),
                    Duration::from_millis(20),
                )),
            )
        })
        .collect();

    let report = run_engine(build_graph(specs, &[]), EngineOptions::default()).await;

    assert_eq!(report.status, RunStatus::Succeeded);
    assert!(max_seen.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn cancellation_drains_and_skips_never_started_tasks() {
    init_tracing();

    let started = Arc::new(Notify::new());
    let graph = build_graph(
        vec![
            spec("blocker", Arc::new(WaitForCancelAction::new(started.clone()))),
            spec("downstream", Arc::new(ScriptedAction::succeeding("downstream"))),
        ],
        &[("blocker", "downstream")],
    );

    let warehouse = Arc::new(FakeWarehouse::new());
    let engine = Engine::new(graph, EngineOptions::default(), warehouse);
    let cancel = engine.cancellation_token();

    let handle = tokio::spawn(engine.run());

    started.notified().await;
    cancel.cancel();

    let report = with_timeout(async { handle.await.expect("engine task panicked") }).await;

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.task("blocker").unwrap().state, TaskState::Failed);
    assert_eq!(report.task("downstream").unwrap().state, TaskState::Skipped);
    assert_eq!(report.task("downstream").unwrap().attempts, 0);
}

#[tokio::test]
async fn fail_run_on_skip_false_still_fails_on_task_failure() {
    init_tracing();

    let graph = build_graph(
        vec![
            spec(
                "a",
                Arc::new(ScriptedAction::always_failing(
                    "a",
                    ExecutionError::Failed("boom".to_string()),
                )),
            ),
            spec("b", Arc::new(ScriptedAction::succeeding("b"))),
        ],
        &[("a", "b")],
    );

    let options = EngineOptions {
        fail_run_on_skip: false,
        ..EngineOptions::default()
    };
    let report = run_engine(graph, options).await;

    // The failed task alone decides the outcome; the flag only governs skips.
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.task("b").unwrap().state, TaskState::Skipped);
}

#[tokio::test]
async fn single_task_graph_succeeds() {
    init_tracing();

    let graph = build_graph(
        vec![spec("only", Arc::new(ScriptedAction::succeeding("only")))],
        &[],
    );

    let report = run_engine(graph, EngineOptions::default()).await;
    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.task("only").unwrap().attempts, 1);
}
