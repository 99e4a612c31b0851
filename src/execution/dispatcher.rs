//! Task dispatcher - runs one message and routes its result
//!
//! Interpreting a result:
//! - `data` goes to the next step of the phase, `skip` to the step named
//!   by `skip_to`. Both edges may fire for the same result.
//! - `Streamed` items are queued one by one as they are taken; `Single`
//!   and `Batch` items are queued together after the running set is updated.
//! - Successors get the parent priority minus one (floored at zero).
//! - The first element of `sentinel` becomes the pipeline sentinel.

use crate::core::blueprint::StepSpec;
use crate::core::message::{successor_priority, Message};
use crate::core::result::{Datum, Output, TaskResult};
use crate::error::EngineError;
use crate::execution::scheduler::Scheduler;
use crate::tasks::{TaskContext, TaskOptions, TaskRegistry};
use serde_json::Value;
use tracing::{debug, warn};

/// What happened while dispatching one message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatched {
    pub task_id: String,

    /// Successors queued immediately from a `Streamed` output
    pub streamed: usize,

    /// Successors queued as a batch on the continuation edge
    pub batched: usize,

    /// Successors queued on the skip edge
    pub skipped: usize,

    /// `skip_to` target that matched no later step
    pub skip_target_missing: Option<String>,

    /// New sentinel value, if the result set one
    pub sentinel: Option<Value>,

    /// Sentinel elements beyond the first, left for an outer scheduler
    pub sentinel_rest: Vec<Value>,

    pub logs: Option<Value>,

    pub metrics: Option<Value>,
}

impl Dispatched {
    /// Total successors created
    pub fn spawned(&self) -> usize {
        self.streamed + self.batched + self.skipped
    }
}

/// Resolves steps to task units, invokes them and routes their results
pub struct Dispatcher {
    registry: TaskRegistry,
    sentinel: Option<Value>,
}

impl Dispatcher {
    pub fn new(registry: TaskRegistry) -> Self {
        Self {
            registry,
            sentinel: None,
        }
    }

    /// Start with a sentinel already set, e.g. one handed down from a previous run
    pub fn with_sentinel(mut self, sentinel: Value) -> Self {
        self.sentinel = Some(sentinel);
        self
    }

    pub fn sentinel(&self) -> Option<&Value> {
        self.sentinel.as_ref()
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Build the options bag for a message
    ///
    /// Any non-null payload becomes `data`, including `0`, `false`, `""`, `[]`
    /// and `{}`; only a missing or `null` payload leaves it unset.
    pub fn options_for(&self, msg: &Message) -> Result<TaskOptions, EngineError> {
        let mut data = msg.payload()?;
        if msg.task.pass_sentinel {
            if let Some(sentinel) = &self.sentinel {
                data = Some(Datum::Json(sentinel.clone()));
            }
        }
        Ok(TaskOptions {
            params: msg.task.params.clone(),
            data,
        })
    }

    /// Run the task unit for `msg` and queue its successors
    pub async fn dispatch(
        &mut self,
        msg: Message,
        scheduler: &mut Scheduler,
        ctx: &TaskContext,
    ) -> Result<Dispatched, EngineError> {
        let task_id = msg.task.id.clone();
        debug!("Dispatching task '{}' (token {})", task_id, msg.task_token);

        let unit = self
            .registry
            .resolve(&task_id)
            .ok_or_else(|| EngineError::TaskNotFound(task_id.clone()))?;
        let options = self.options_for(&msg)?;

        let invocation = unit.run(options, ctx);
        let outcome = match ctx.timeout() {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .map_err(|_| EngineError::TaskTimeout {
                    task: task_id.clone(),
                    timeout: limit,
                })?,
            None => invocation.await,
        };
        let result = outcome
            .map_err(|source| EngineError::Task {
                task: task_id.clone(),
                source,
            })?
            .ok_or_else(|| EngineError::MissingResult(task_id.clone()))?;

        self.route(msg, result, scheduler).await
    }

    /// Interpret a task result: create, register and queue successors
    pub async fn route(
        &mut self,
        msg: Message,
        result: TaskResult,
        scheduler: &mut Scheduler,
    ) -> Result<Dispatched, EngineError> {
        let TaskResult {
            data,
            logs,
            metrics,
            sentinel,
            skip,
        } = result;

        let mut report = Dispatched {
            task_id: msg.task.id.clone(),
            logs,
            metrics,
            ..Dispatched::default()
        };

        let next_step = msg.next_tasks.first();
        let further_steps = msg.next_tasks.get(1..).unwrap_or_default();

        let skip_target = match msg.task.skip_to.as_deref() {
            Some(target) => {
                let found = msg.next_tasks.iter().rposition(|s| s.id == target);
                if found.is_none() {
                    warn!(
                        "Task '{}' skips to '{}', which is not a later step of its phase; skip branch ignored",
                        msg.task.id, target
                    );
                    report.skip_target_missing = Some(target.to_string());
                }
                found.map(|i| (&msg.next_tasks[i], &msg.next_tasks[i + 1..]))
            }
            None => None,
        };

        let priority = successor_priority(msg.priority);
        let mut batch = Vec::new();

        match (next_step, data) {
            (Some(step), Some(output)) if !output.is_empty() => {
                let (streamed, batched) =
                    fan_out(step, further_steps, priority, output, scheduler, &mut batch).await?;
                report.streamed += streamed;
                report.batched += batched;
            }
            (None, Some(output)) if !output.is_empty() => {
                debug!("Task '{}' is last in its phase, dropping its data", msg.task.id);
            }
            _ => {}
        }

        if let (Some((step, further)), Some(output)) = (skip_target, skip) {
            if !output.is_empty() {
                let (streamed, batched) =
                    fan_out(step, further, priority, output, scheduler, &mut batch).await?;
                report.streamed += streamed;
                report.skipped += batched;
            }
        }

        for successor in &batch {
            scheduler.register(successor.task_token.clone());
        }
        scheduler.complete(&msg.task_token);

        if let Some(value) = sentinel {
            let Value::Array(items) = value else {
                return Err(EngineError::ContractViolation {
                    task: msg.task.id.clone(),
                    reason: "sentinel must be a list".to_string(),
                });
            };
            let mut items = items.into_iter();
            if let Some(first) = items.next() {
                debug!("Task '{}' set the sentinel to {}", msg.task.id, first);
                self.sentinel = Some(first.clone());
                report.sentinel = Some(first);
                report.sentinel_rest = items.collect();
            }
        }

        for successor in &batch {
            scheduler.enqueue(successor).await?;
        }

        debug!(
            "Task '{}' spawned {} successor(s) ({} streamed, {} batched, {} skipped)",
            msg.task.id,
            report.spawned(),
            report.streamed,
            report.batched,
            report.skipped
        );
        Ok(report)
    }
}

/// Turn one output into successors of `step`
///
/// Streamed items are registered and queued right away; the rest are
/// pushed to `batch`. Returns `(streamed, batched)` counts.
async fn fan_out(
    step: &StepSpec,
    further: &[StepSpec],
    priority: u32,
    output: Output,
    scheduler: &mut Scheduler,
    batch: &mut Vec<Message>,
) -> Result<(usize, usize), EngineError> {
    let streamed = output.is_streamed();
    let items = output.into_items();
    let count = items.len();

    for item in items {
        let successor = Message::successor(step, further, priority, item);
        if streamed {
            scheduler.register(successor.task_token.clone());
            scheduler.enqueue(&successor).await?;
        } else {
            batch.push(successor);
        }
    }

    Ok(if streamed { (count, 0) } else { (0, count) })
}
