//! Test: Cancellation - an interrupt stops the run without draining

use crate::helpers::*;
use nightwatch::core::blueprint::Blueprint;
use nightwatch::core::result::{Output, TaskResult};
use nightwatch::core::state::RunStatus;
use nightwatch::tasks::builtin::register_builtins;
use std::time::Duration;

#[tokio::test]
async fn test_shutdown_interrupts_running_task() {
    let mut harness = Harness::new().sink("after");
    register_builtins(&mut harness.registry);
    let blueprint = Blueprint::new(vec![
        vec![step("examples.sleep").with_param("duration", 30), step("after")],
        phase(&["after"]),
    ]);
    let engine = harness.engine(blueprint);
    let shutdown = engine.shutdown_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.shutdown();
    });

    let run = tokio::time::timeout(Duration::from_secs(5), run_engine(engine))
        .await
        .expect("cancelled run should return promptly");

    let report = run.result.unwrap();
    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(harness.log.calls_to("after").is_empty());
}

#[tokio::test]
async fn test_queued_messages_are_abandoned() {
    let harness = Harness::new()
        .task("a", |_| Ok(Some(TaskResult::new().with_data(Output::batch(["1", "2", "3"])))))
        .sink("b");
    let mut engine = harness.engine(Blueprint::new(vec![phase(&["a", "b"])]));
    let shutdown = engine.shutdown_handle();
    // Stop as soon as the first fan-out item is handled
    let stop = shutdown.clone();
    engine.add_event_handler(move |event| {
        if let nightwatch::PipelineEvent::TaskCompleted { task_id, .. } = event {
            if task_id == "b" {
                stop.shutdown();
            }
        }
    });

    let run = run_engine(engine).await;

    assert_eq!(run.report.status, RunStatus::Cancelled);
    assert_eq!(harness.log.calls_to("b").len(), 1);
    assert!(shutdown.is_shutdown());
}
