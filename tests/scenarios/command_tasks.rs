//! Test: Command Tasks - discovered executables as task units

#![cfg(unix)]

use crate::helpers::*;
use nightwatch::core::blueprint::Blueprint;
use nightwatch::core::config::EngineConfig;
use nightwatch::core::result::Datum;
use nightwatch::error::EngineError;
use nightwatch::execution::Engine;
use nightwatch::tasks::TaskRegistry;
use serde_json::json;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

fn write_task(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[tokio::test]
async fn test_discovered_tasks_fan_out_and_skip() {
    let dir = tempfile::tempdir().unwrap();
    write_task(
        dir.path(),
        "fs/list.sh",
        r#"cat > /dev/null; echo '{"data": {"many": ["a.json", "b.json"]}, "skip": "done", "sentinel": ["2024"]}'"#,
    );
    write_task(dir.path(), "fs/flag.sh", "cat > /dev/null; echo '{}'");

    let mut harness = Harness::new().sink("importer");
    let count = harness.registry.discover(dir.path()).unwrap();
    assert_eq!(count, 2);

    let blueprint = Blueprint::new(vec![vec![
        step("fs.list").with_skip_to("fs.flag"),
        step("importer"),
        step("fs.flag"),
    ]]);
    let run = harness.run(blueprint).await;

    assert_completed(&run);
    let received: Vec<_> = harness
        .log
        .calls_to("importer")
        .iter()
        .map(|c| c.json().cloned().unwrap())
        .collect();
    assert_eq!(received, vec![json!("a.json"), json!("b.json")]);
    assert_eq!(run.report.sentinel, Some(json!("2024")));
    // Two importer messages plus the skip message to fs.flag
    assert_eq!(run.report.messages_spawned, 3);
}

#[tokio::test]
async fn test_command_receives_params_and_binary_data() {
    let dir = tempfile::tempdir().unwrap();
    // Echo stdin back as the single data value
    write_task(dir.path(), "echo.sh", r#"printf '{"data": '; cat; printf '}'"#);

    let harness = Harness::new()
        .task("source", |_| {
            Ok(Some(nightwatch::TaskResult::new().with_data(nightwatch::Output::single(b"hi".to_vec()))))
        })
        .sink("sink");
    let mut registry = harness.registry.clone();
    registry.discover(dir.path()).unwrap();

    let blueprint = Blueprint::new(vec![vec![
        step("source"),
        step("echo").with_param("mode", "raw"),
        step("sink"),
    ]]);
    let engine = Engine::new(blueprint, registry, EngineConfig::new().with_idle_timeout(TEST_IDLE));
    let run = run_engine(engine).await;

    assert_completed(&run);
    let echoed = harness.log.calls_to("sink")[0].data.clone();
    assert_eq!(
        echoed,
        Some(Datum::Json(json!({"params": {"mode": "raw"}, "data": {"enc": "b64", "raw": "aGk="}})))
    );
}

#[tokio::test]
async fn test_failing_command_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    write_task(dir.path(), "broken.sh", "cat > /dev/null; echo 'boom' >&2; exit 2");

    let mut registry = TaskRegistry::new();
    registry.discover(dir.path()).unwrap();
    let engine = Engine::new(
        Blueprint::new(vec![phase(&["broken"])]),
        registry,
        EngineConfig::new().with_idle_timeout(TEST_IDLE),
    );

    let run = run_engine(engine).await;

    match run.result {
        Err(EngineError::Task { task, source }) => {
            assert_eq!(task, "broken");
            assert!(source.to_string().contains("boom"));
        }
        _ => panic!("expected the command failure to abort the run"),
    }
}
