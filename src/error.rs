//! Error types for the orchestrator and for task units

use std::time::Duration;
use thiserror::Error;

/// Errors a task unit reports back to the dispatcher
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("missing required parameter '{0}'")]
    MissingParam(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("{0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task was cancelled")]
    Cancelled,
}

/// Errors that abort a pipeline run
#[derive(Debug, Error)]
pub enum EngineError {
    /// The task id could not be located in the registry
    #[error("task '{0}' is not available")]
    TaskNotFound(String),

    #[error("got no result from task '{0}'")]
    MissingResult(String),

    #[error("task '{task}' broke the result contract: {reason}")]
    ContractViolation { task: String, reason: String },

    #[error("task '{task}' failed: {source}")]
    Task {
        task: String,
        #[source]
        source: TaskError,
    },

    #[error("task '{task}' timed out after {timeout:?}")]
    TaskTimeout { task: String, timeout: Duration },

    /// The queue went idle while tokens were still registered as running
    #[error("pipeline stalled: queue idle with {running} task(s) still registered")]
    Stalled { running: usize },

    #[error("blueprint has no phases")]
    EmptyBlueprint,

    #[error("phase {0} has no steps")]
    EmptyPhase(usize),

    #[error("invalid payload: {0}")]
    Payload(String),

    #[error("message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
