//! nightwatch - a phase-ordered job orchestrator with priority scheduling and fan-out

pub mod cli;
pub mod core;
pub mod error;
pub mod execution;
pub mod logging;
pub mod tasks;

// Re-export commonly used types
pub use crate::core::{Blueprint, Datum, EngineConfig, JobConfig, JobVariables, Output, RunReport, RunStatus, StepSpec, TaskResult};
pub use crate::error::{EngineError, TaskError};
pub use crate::execution::{Engine, PipelineEvent, ShutdownHandle};
pub use crate::tasks::{TaskContext, TaskOptions, TaskRegistry, TaskUnit};
