//! Main execution engine - drives a blueprint from the first phase to the last

use crate::{
    core::{
        blueprint::Blueprint,
        config::{EngineConfig, JobConfig},
        message::TaskToken,
        state::{RunReport, RunStatus},
        variables::{self, JobVariables},
    },
    error::EngineError,
    execution::{
        dispatcher::{Dispatched, Dispatcher},
        queue::MessageQueue,
        scheduler::{Next, Scheduler},
    },
    tasks::{TaskContext, TaskRegistry},
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    PipelineStarted {
        run_id: Uuid,
        name: Option<String>,
        phases: usize,
    },
    PhaseStarted {
        phase: usize,
        task_id: String,
    },
    TaskStarted {
        task_id: String,
        token: TaskToken,
        priority: u32,
    },
    TaskCompleted {
        task_id: String,
        token: TaskToken,
        spawned: usize,
        logs: Option<Value>,
        metrics: Option<Value>,
    },
    SkipTargetMissing {
        task_id: String,
        target: String,
    },
    SentinelSet {
        value: Value,
    },
    PipelineFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Requests a graceful stop of a running engine
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Pipeline execution engine
///
/// Owns the scheduler and the dispatcher and runs their loop on a single
/// task: take the next message, dispatch it, repeat until the last phase
/// drains.
pub struct Engine {
    config: EngineConfig,
    scheduler: Scheduler,
    dispatcher: Dispatcher,
    handlers: Vec<EventHandler>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    report: RunReport,
}

impl Engine {
    pub fn new(blueprint: Blueprint, registry: TaskRegistry, config: EngineConfig) -> Self {
        let phases = blueprint.phase_count();
        let scheduler = Scheduler::new(blueprint, config.start_priority);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            scheduler,
            dispatcher: Dispatcher::new(registry),
            handlers: Vec::new(),
            shutdown_tx: Arc::new(shutdown_tx),
            report: RunReport::new(None, phases),
        }
    }

    /// Build an engine for a job file, substituting its variables into the blueprint
    pub fn from_job(job: &JobConfig, job_vars: &JobVariables, registry: TaskRegistry, config: EngineConfig) -> Self {
        let blueprint = variables::resolve_with(job.blueprint.clone(), &job.variables(), job_vars);
        let mut engine = Self::new(blueprint, registry, config);
        engine.report.name = job.name.clone();
        engine
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.report.name = Some(name.into());
        self
    }

    /// Replace the in-memory ready queue
    pub fn with_queue(mut self, queue: Box<dyn MessageQueue>) -> Self {
        let blueprint = self.scheduler.blueprint().clone();
        self.scheduler = Scheduler::with_queue(blueprint, self.config.start_priority, queue);
        self
    }

    /// Seed the sentinel, e.g. with a value left over from a previous run
    pub fn with_sentinel(mut self, sentinel: Value) -> Self {
        self.report.sentinel = Some(sentinel.clone());
        self.dispatcher = self.dispatcher.with_sentinel(sentinel);
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn blueprint(&self) -> &Blueprint {
        self.scheduler.blueprint()
    }

    /// Emit an event to all handlers
    fn emit(&self, event: PipelineEvent) {
        for handler in &self.handlers {
            handler(event.clone());
        }
    }

    /// Run the pipeline to completion
    ///
    /// A run stopped through the [`ShutdownHandle`] ends with
    /// [`RunStatus::Cancelled`] and still returns `Ok`. Any error aborts
    /// the run; the failed report stays available through [`Engine::report`].
    pub async fn run(&mut self) -> Result<RunReport, EngineError> {
        let run_id = self.report.run_id;
        info!(
            "Starting pipeline run {} ({} phase(s))",
            run_id, self.report.phases_total
        );
        self.report.start();
        self.emit(PipelineEvent::PipelineStarted {
            run_id,
            name: self.report.name.clone(),
            phases: self.report.phases_total,
        });

        match self.drive().await {
            Ok(true) => {
                info!("Pipeline run {} completed", run_id);
                self.report.complete();
            }
            Ok(false) => {
                warn!("Pipeline run {} cancelled", run_id);
                self.report.cancel();
            }
            Err(e) => {
                error!("Pipeline run {} failed: {}", run_id, e);
                self.report.fail(e.to_string());
                self.emit(PipelineEvent::PipelineFinished {
                    run_id,
                    status: RunStatus::Failed,
                });
                return Err(e);
            }
        }

        self.emit(PipelineEvent::PipelineFinished {
            run_id,
            status: self.report.status,
        });
        Ok(self.report.clone())
    }

    /// Main loop; `Ok(false)` means the run was cancelled
    async fn drive(&mut self) -> Result<bool, EngineError> {
        let ctx = TaskContext::new(self.shutdown_tx.subscribe(), self.config.task_timeout);
        if ctx.is_cancelled() {
            return Ok(false);
        }

        self.scheduler.start_phase(0).await?;
        self.phase_started(0);

        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Ok(false),
                next = self.scheduler.next(self.config.idle_timeout) => next?,
            };

            match next {
                Next::Message(msg) => {
                    let task_id = msg.task.id.clone();
                    let token = msg.task_token.clone();
                    self.emit(PipelineEvent::TaskStarted {
                        task_id,
                        token: token.clone(),
                        priority: msg.priority,
                    });
                    self.report.tasks_dispatched += 1;

                    let outcome = tokio::select! {
                        biased;
                        _ = ctx.cancelled() => return Ok(false),
                        outcome = self.dispatcher.dispatch(msg, &mut self.scheduler, &ctx) => outcome,
                    };
                    match outcome {
                        Ok(dispatched) => self.record(token, dispatched),
                        // A unit that noticed the shutdown first
                        Err(_) if ctx.is_cancelled() => return Ok(false),
                        Err(e) => return Err(e),
                    }
                }
                Next::PhaseStarted(phase) => {
                    self.report.phases_completed += 1;
                    self.phase_started(phase);
                }
                Next::Complete => {
                    self.report.phases_completed += 1;
                    return Ok(true);
                }
            }
        }
    }

    fn phase_started(&self, phase: usize) {
        let task_id = self
            .scheduler
            .blueprint()
            .phase(phase)
            .and_then(|steps| steps.first())
            .map(|step| step.id.clone())
            .unwrap_or_default();
        self.emit(PipelineEvent::PhaseStarted { phase, task_id });
    }

    fn record(&mut self, token: TaskToken, dispatched: Dispatched) {
        self.report.messages_spawned += dispatched.spawned();

        if let Some(target) = dispatched.skip_target_missing.clone() {
            self.emit(PipelineEvent::SkipTargetMissing {
                task_id: dispatched.task_id.clone(),
                target,
            });
        }

        if let Some(value) = dispatched.sentinel.clone() {
            info!("Sentinel set to {}", value);
            self.report.sentinel = Some(value.clone());
            self.report.pending_sentinels = dispatched.sentinel_rest.clone();
            self.emit(PipelineEvent::SentinelSet { value });
        }

        let spawned = dispatched.spawned();
        self.emit(PipelineEvent::TaskCompleted {
            task_id: dispatched.task_id,
            token,
            spawned,
            logs: dispatched.logs,
            metrics: dispatched.metrics,
        });
    }
}
