//! Test: Sentinel - a pipeline-wide value carried across phases

use crate::helpers::*;
use nightwatch::core::blueprint::Blueprint;
use nightwatch::core::result::{Datum, Output, TaskResult};
use nightwatch::error::EngineError;
use nightwatch::execution::PipelineEvent;
use serde_json::json;

#[tokio::test]
async fn test_sentinel_reaches_later_phase() {
    let harness = Harness::new()
        .task("pick", |_| Ok(Some(TaskResult::new().with_sentinel(["import/2024-01", "import/2024-02"]))))
        .sink("list");
    let blueprint = Blueprint::new(vec![vec![step("pick")], vec![step("list").with_pass_sentinel()]]);

    let run = harness.run(blueprint).await;

    assert_completed(&run);
    assert_eq!(harness.log.calls_to("list")[0].data, Some(Datum::from("import/2024-01")));
    assert_eq!(run.report.sentinel, Some(json!("import/2024-01")));
    assert_eq!(run.report.pending_sentinels, vec![json!("import/2024-02")]);
}

#[tokio::test]
async fn test_sentinel_last_write_wins() {
    let harness = Harness::new()
        .task("first", |_| Ok(Some(TaskResult::new().with_sentinel(["x"]).with_data(Output::single("go")))))
        .task("second", |_| Ok(Some(TaskResult::new().with_sentinel(["z"]))))
        .sink("use");
    let blueprint = Blueprint::new(vec![phase(&["first", "second"]), vec![step("use").with_pass_sentinel()]]);

    let run = harness.run(blueprint).await;

    assert_completed(&run);
    assert_eq!(harness.log.calls_to("use")[0].data, Some(Datum::from("z")));
    let set: Vec<_> = run
        .events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::SentinelSet { value } => Some(value.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(set, vec![json!("x"), json!("z")]);
}

#[tokio::test]
async fn test_pass_sentinel_before_any_sentinel_keeps_payload() {
    let harness = Harness::new()
        .task("a", |_| Ok(Some(TaskResult::new().with_data(Output::single("own")))))
        .sink("b");
    let blueprint = Blueprint::new(vec![vec![step("a"), step("b").with_pass_sentinel()]]);

    let run = harness.run(blueprint).await;

    assert_completed(&run);
    assert_eq!(harness.log.calls_to("b")[0].data, Some(Datum::from("own")));
}

#[tokio::test]
async fn test_seeded_sentinel_is_available_from_the_start() {
    let harness = Harness::new().sink("a");
    let blueprint = Blueprint::new(vec![vec![step("a").with_pass_sentinel()]]);

    let run = run_engine(harness.engine(blueprint).with_sentinel(json!("carried"))).await;

    assert_completed(&run);
    assert_eq!(harness.log.calls_to("a")[0].data, Some(Datum::from("carried")));
}

#[tokio::test]
async fn test_non_list_sentinel_aborts_the_run() {
    let harness = Harness::new().task("a", |_| {
        let mut result = TaskResult::new();
        result.sentinel = Some(json!({"dir": "x"}));
        Ok(Some(result))
    });

    let run = harness.run(Blueprint::new(vec![phase(&["a"])])).await;

    assert!(matches!(run.result, Err(EngineError::ContractViolation { .. })));
}
