//! CLI command definitions

use crate::core::config::{EngineConfig, JobConfig};
use crate::core::variables::JobVariables;
use crate::tasks::TaskRegistry;
use anyhow::{Context, Result};
use clap::Args;
use std::time::Duration;

/// Job file plus the overrides shared by `run` and `print`
#[derive(Debug, Args, Clone)]
pub struct JobArgs {
    /// Path to the job YAML file
    pub file: String,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub var: Vec<(String, String)>,

    /// Working directory, overriding the job file
    #[arg(long)]
    pub working_dir: Option<String>,

    /// Value for $LAST_SUCCESSFUL_RUN
    #[arg(long)]
    pub last_successful_run: Option<String>,
}

impl JobArgs {
    /// Load the job file and apply the overrides
    pub fn load(&self) -> Result<JobConfig> {
        let mut job = JobConfig::from_file(&self.file)
            .with_context(|| format!("Failed to load job {}", self.file))?;
        if let Some(dir) = &self.working_dir {
            job.working_dir = Some(dir.clone());
        }
        for (key, value) in &self.var {
            job.set_variable(key.clone(), value.clone());
        }
        Ok(job)
    }

    /// System variables for this invocation
    pub fn job_variables(&self, job: &JobConfig) -> JobVariables {
        let vars = JobVariables::now(job.working_dir.as_deref());
        match &self.last_successful_run {
            Some(marker) => vars.with_last_successful_run(marker.clone()),
            None => vars,
        }
    }
}

/// Run a job
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    #[command(flatten)]
    pub job: JobArgs,

    /// Directory of executable task units to register
    #[arg(long)]
    pub tasks_dir: Option<String>,

    /// How long the queue may stay idle before a phase counts as drained
    #[arg(long)]
    pub idle_timeout_ms: Option<u64>,

    /// Abort the run if one task takes longer than this
    #[arg(long)]
    pub task_timeout_secs: Option<u64>,

    /// Initial sentinel value (JSON)
    #[arg(long)]
    pub sentinel: Option<String>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new();
        if let Some(ms) = self.idle_timeout_ms {
            config = config.with_idle_timeout(Duration::from_millis(ms));
        }
        if let Some(secs) = self.task_timeout_secs {
            config = config.with_task_timeout(Duration::from_secs(secs));
        }
        config
    }

    pub fn initial_sentinel(&self) -> Result<Option<serde_json::Value>> {
        self.sentinel
            .as_deref()
            .map(|raw| serde_json::from_str(raw).context("Sentinel must be valid JSON"))
            .transpose()
    }
}

/// Validate a job file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the job YAML file
    pub file: String,

    /// Directory of executable task units to check against
    #[arg(long)]
    pub tasks_dir: Option<String>,

    /// Output the parsed job as JSON
    #[arg(long)]
    pub json: bool,
}

/// Print the resolved blueprint of a job
#[derive(Debug, Args, Clone)]
pub struct PrintCommand {
    #[command(flatten)]
    pub job: JobArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List available task units
#[derive(Debug, Args, Clone)]
pub struct TasksCommand {
    /// Directory of executable task units to include
    #[arg(long)]
    pub tasks_dir: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Built-in task units plus any discovered under `tasks_dir`
pub fn build_registry(tasks_dir: Option<&str>) -> Result<TaskRegistry> {
    let mut registry = TaskRegistry::with_builtins();
    if let Some(dir) = tasks_dir {
        registry
            .discover(dir)
            .with_context(|| format!("Failed to scan task directory {}", dir))?;
    }
    Ok(registry)
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
