//! Core domain models
//!
//! Blueprints and their steps, job variables, the message envelope that
//! travels through the queue, task results and run state.

pub mod blueprint;
pub mod config;
pub mod message;
pub mod result;
pub mod state;
pub mod variables;

pub use blueprint::{Blueprint, Phase, StepSpec};
pub use config::{EngineConfig, JobConfig};
pub use message::{Message, TaskToken};
pub use result::{Datum, Output, TaskResult};
pub use state::{RunReport, RunStatus};
pub use variables::{JobVariables, Variables};
