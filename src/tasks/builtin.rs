//! Built-in example task units

use crate::core::result::{Output, TaskResult};
use crate::error::TaskError;
use crate::tasks::{TaskContext, TaskOptions, TaskRegistry, TaskUnit};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const SLEEP: &str = "examples.sleep";
pub const MANY_MESSAGES: &str = "examples.many_messages";

pub fn register_builtins(registry: &mut TaskRegistry) {
    registry.register(SLEEP, SleepTask);
    registry.register(MANY_MESSAGES, ManyMessagesTask);
}

/// Sleeps for `params.duration` seconds
pub struct SleepTask;

#[async_trait]
impl TaskUnit for SleepTask {
    async fn run(&self, options: TaskOptions, ctx: &TaskContext) -> Result<Option<TaskResult>, TaskError> {
        let seconds = options
            .require_param("duration")?
            .as_f64()
            .filter(|s| s.is_finite() && *s >= 0.0)
            .ok_or_else(|| TaskError::InvalidParam {
                name: "duration".to_string(),
                reason: "expected a non-negative number of seconds".to_string(),
            })?;
        let duration = Duration::try_from_secs_f64(seconds).map_err(|e| TaskError::InvalidParam {
            name: "duration".to_string(),
            reason: e.to_string(),
        })?;

        debug!("Sleep for {} seconds", seconds);
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = ctx.cancelled() => return Err(TaskError::Cancelled),
        }
        debug!("Finished sleeping");

        Ok(Some(
            TaskResult::new()
                .with_logs(json!([[format!("Slept for {} seconds", seconds)]]))
                .with_metrics(json!({"slept": 1})),
        ))
    }
}

/// Fans out `params.messages` successors carrying 0..n
pub struct ManyMessagesTask;

#[async_trait]
impl TaskUnit for ManyMessagesTask {
    async fn run(&self, options: TaskOptions, _ctx: &TaskContext) -> Result<Option<TaskResult>, TaskError> {
        let count = options
            .require_param("messages")?
            .as_u64()
            .ok_or_else(|| TaskError::InvalidParam {
                name: "messages".to_string(),
                reason: "expected a non-negative integer".to_string(),
            })?;

        debug!("Creating {} messages", count);
        Ok(Some(TaskResult::new().with_data(Output::batch((0..count).map(|i| json!(i))))))
    }
}
