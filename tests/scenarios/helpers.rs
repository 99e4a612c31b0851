//! Test utilities: scripted task units and run helpers

use async_trait::async_trait;
use nightwatch::core::blueprint::{Blueprint, StepSpec};
use nightwatch::core::config::EngineConfig;
use nightwatch::core::result::{Datum, TaskResult};
use nightwatch::core::state::{RunReport, RunStatus};
use nightwatch::error::{EngineError, TaskError};
use nightwatch::execution::{Engine, PipelineEvent};
use nightwatch::tasks::{TaskContext, TaskOptions, TaskRegistry, TaskUnit};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Idle window short enough to keep phase transitions fast in tests
pub const TEST_IDLE: Duration = Duration::from_millis(30);

/// One recorded task invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub task: String,
    pub data: Option<Datum>,
    pub params: Option<serde_json::Map<String, Value>>,
}

impl Call {
    /// The incoming payload as JSON, if it was JSON
    pub fn json(&self) -> Option<&Value> {
        self.data.as_ref().and_then(Datum::as_json)
    }
}

/// Shared, ordered log of invocations across all scripted units
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Task ids in invocation order
    pub fn order(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.task).collect()
    }

    pub fn calls_to(&self, task: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.task == task).collect()
    }
}

type Script = dyn Fn(&TaskOptions) -> Result<Option<TaskResult>, TaskError> + Send + Sync;

/// Task unit whose behavior is a closure; every call is recorded
pub struct Scripted {
    id: String,
    log: CallLog,
    script: Box<Script>,
}

#[async_trait]
impl TaskUnit for Scripted {
    async fn run(&self, options: TaskOptions, _ctx: &TaskContext) -> Result<Option<TaskResult>, TaskError> {
        self.log.push(Call {
            task: self.id.clone(),
            data: options.data.clone(),
            params: options.params.clone(),
        });
        (self.script)(&options)
    }
}

/// Registry builder that wires scripted units to one call log
pub struct Harness {
    pub registry: TaskRegistry,
    pub log: CallLog,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            registry: TaskRegistry::new(),
            log: CallLog::new(),
        }
    }

    /// Register a scripted unit under `id`
    pub fn task<F>(mut self, id: &str, script: F) -> Self
    where
        F: Fn(&TaskOptions) -> Result<Option<TaskResult>, TaskError> + Send + Sync + 'static,
    {
        self.registry.register(
            id,
            Scripted {
                id: id.to_string(),
                log: self.log.clone(),
                script: Box::new(script),
            },
        );
        self
    }

    /// Register a unit that returns an empty result
    pub fn sink(self, id: &str) -> Self {
        self.task(id, |_| Ok(Some(TaskResult::new())))
    }

    pub fn engine(&self, blueprint: Blueprint) -> Engine {
        Engine::new(blueprint, self.registry.clone(), EngineConfig::new().with_idle_timeout(TEST_IDLE))
    }

    /// Run to completion, collecting every event
    pub async fn run(&self, blueprint: Blueprint) -> Run {
        let engine = self.engine(blueprint);
        run_engine(engine).await
    }
}

/// Outcome of a test run
pub struct Run {
    pub result: Result<RunReport, EngineError>,
    pub report: RunReport,
    pub events: Vec<PipelineEvent>,
}

impl Run {
    /// (task id, priority) for each dispatched message, in order
    pub fn dispatched(&self) -> Vec<(String, u32)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::TaskStarted { task_id, priority, .. } => Some((task_id.clone(), *priority)),
                _ => None,
            })
            .collect()
    }

    pub fn phases_started(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::PhaseStarted { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect()
    }
}

pub async fn run_engine(mut engine: Engine) -> Run {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let result = engine.run().await;
    let report = engine.report().clone();
    let events = events.lock().unwrap().clone();
    Run { result, report, events }
}

pub fn step(id: &str) -> StepSpec {
    StepSpec::new(id, id.to_uppercase())
}

pub fn phase(ids: &[&str]) -> Vec<StepSpec> {
    ids.iter().map(|id| step(id)).collect()
}

pub fn assert_completed(run: &Run) {
    match &run.result {
        Ok(report) => assert_eq!(report.status, RunStatus::Completed, "report: {:?}", report),
        Err(e) => panic!("run failed: {}", e),
    }
}
