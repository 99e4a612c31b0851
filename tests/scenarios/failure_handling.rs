//! Test: Failure Handling - any task failure aborts the run

use crate::helpers::*;
use async_trait::async_trait;
use nightwatch::core::blueprint::Blueprint;
use nightwatch::core::config::EngineConfig;
use nightwatch::core::result::{Output, TaskResult};
use nightwatch::core::state::RunStatus;
use nightwatch::error::{EngineError, TaskError};
use nightwatch::execution::{Engine, MessageQueue, PipelineEvent, PriorityQueue};
use nightwatch::tasks::{TaskContext, TaskOptions, TaskUnit};
use std::time::Duration;

#[tokio::test]
async fn test_task_failure_aborts_remaining_work() {
    let harness = Harness::new()
        .task("a", |_| Ok(Some(TaskResult::new().with_data(Output::batch(["1", "2"])))))
        .task("b", |_| Err(TaskError::Failed("disk full".to_string())))
        .sink("c");
    let blueprint = Blueprint::new(vec![phase(&["a", "b"]), phase(&["c"])]);

    let run = harness.run(blueprint).await;

    match &run.result {
        Err(EngineError::Task { task, source }) => {
            assert_eq!(task, "b");
            assert_eq!(source.to_string(), "disk full");
        }
        other => panic!("expected task failure, got {:?}", other.as_ref().map(|r| r.status)),
    }
    // No retry, no further dispatch
    assert_eq!(harness.log.order(), vec!["a", "b"]);
    assert_eq!(run.report.status, RunStatus::Failed);
    assert!(matches!(
        run.events.last(),
        Some(PipelineEvent::PipelineFinished { status: RunStatus::Failed, .. })
    ));
}

#[tokio::test]
async fn test_missing_result_aborts() {
    let harness = Harness::new().task("a", |_| Ok(None)).sink("b");

    let run = harness.run(Blueprint::new(vec![phase(&["a", "b"])])).await;

    assert!(matches!(run.result, Err(EngineError::MissingResult(ref id)) if id == "a"));
    assert_eq!(harness.log.order(), vec!["a"]);
}

#[tokio::test]
async fn test_unknown_task_aborts() {
    let harness = Harness::new().sink("a");

    let run = harness.run(Blueprint::new(vec![phase(&["a"]), phase(&["tasks.fs.gone"])])).await;

    assert!(matches!(run.result, Err(EngineError::TaskNotFound(ref id)) if id == "tasks.fs.gone"));
    assert_eq!(run.report.phases_completed, 1);
}

#[tokio::test]
async fn test_namespaced_registration_resolves_short_id() {
    let mut harness = Harness::new();
    harness = harness.sink("pipelines.tasks.fs.list");

    let run = harness.run(Blueprint::new(vec![phase(&["tasks.fs.list"])])).await;

    assert_completed(&run);
}

#[tokio::test]
async fn test_empty_blueprint_is_rejected() {
    let run = Harness::new().run(Blueprint::default()).await;
    assert!(matches!(run.result, Err(EngineError::EmptyBlueprint)));
}

#[tokio::test]
async fn test_empty_phase_is_rejected_when_reached() {
    let harness = Harness::new().sink("a");

    let run = harness.run(Blueprint::new(vec![phase(&["a"]), vec![]])).await;

    assert!(matches!(run.result, Err(EngineError::EmptyPhase(1))));
    assert_eq!(harness.log.order(), vec!["a"]);
}

/// Queue that silently drops every message after the first `keep`
struct LossyQueue {
    inner: PriorityQueue,
    keep: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl MessageQueue for LossyQueue {
    async fn push(&self, priority: u32, payload: String) {
        let left = self.keep.load(std::sync::atomic::Ordering::SeqCst);
        if left > 0 {
            self.keep.store(left - 1, std::sync::atomic::Ordering::SeqCst);
            self.inner.push(priority, payload).await;
        }
    }

    async fn pop(&self, timeout: Duration) -> Option<String> {
        self.inner.pop(timeout).await
    }

    async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[tokio::test]
async fn test_lost_message_is_reported_as_stall() {
    let harness = Harness::new()
        .task("a", |_| Ok(Some(TaskResult::new().with_data(Output::single("x")))))
        .sink("b");
    let queue = LossyQueue {
        inner: PriorityQueue::new(),
        keep: std::sync::atomic::AtomicUsize::new(1),
    };
    let engine = harness
        .engine(Blueprint::new(vec![phase(&["a", "b"])]))
        .with_queue(Box::new(queue));

    let run = run_engine(engine).await;

    assert!(matches!(run.result, Err(EngineError::Stalled { running: 1 })));
    assert_eq!(harness.log.order(), vec!["a"]);
}

struct Hang;

#[async_trait]
impl TaskUnit for Hang {
    async fn run(&self, _options: TaskOptions, _ctx: &TaskContext) -> Result<Option<TaskResult>, TaskError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Some(TaskResult::new()))
    }
}

#[tokio::test]
async fn test_task_timeout_aborts() {
    let mut harness = Harness::new();
    harness.registry.register("hang", Hang);
    let engine = Engine::new(
        Blueprint::new(vec![phase(&["hang"])]),
        harness.registry.clone(),
        EngineConfig::new()
            .with_idle_timeout(TEST_IDLE)
            .with_task_timeout(Duration::from_millis(50)),
    );

    let run = run_engine(engine).await;

    assert!(matches!(run.result, Err(EngineError::TaskTimeout { ref task, .. }) if task == "hang"));
}
