//! Job configuration from YAML, and engine settings

use crate::core::blueprint::Blueprint;
use crate::core::variables::Variables;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Default idle window before the scheduler decides a phase is drained
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Top-level job description loaded from YAML (or JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name (optional)
    #[serde(default)]
    pub name: Option<String>,

    /// Value of `$WORKING_DIR`
    #[serde(default)]
    pub working_dir: Option<String>,

    /// User variables, substituted as `<name>` in step parameters
    #[serde(default)]
    variables: IndexMap<String, Value>,

    /// The pipeline itself
    #[serde(flatten)]
    pub blueprint: Blueprint,
}

impl JobConfig {
    /// Load job configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse job configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: JobConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the job configuration
    pub fn validate(&self) -> Result<()> {
        if self.blueprint.phases.is_empty() {
            anyhow::bail!("Blueprint has no phases");
        }

        let task_id = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")?;

        for (phase_idx, phase) in self.blueprint.phases.iter().enumerate() {
            if phase.is_empty() {
                anyhow::bail!("Phase {} has no steps", phase_idx);
            }
            for step in phase {
                if !task_id.is_match(&step.id) {
                    anyhow::bail!(
                        "Step '{}' in phase {} has an invalid task id (expected a dotted path)",
                        step.label(),
                        phase_idx
                    );
                }
            }
        }

        Ok(())
    }

    /// Non-fatal findings about the blueprint
    pub fn lint(&self) -> Vec<String> {
        self.blueprint
            .unmatched_skip_targets()
            .into_iter()
            .map(|(phase, step, target)| {
                format!(
                    "Phase {} step {} ('{}') skips to '{}', which is not a later step of the phase; its skip branch will never fire",
                    phase,
                    step,
                    self.blueprint.phases[phase][step].label(),
                    target
                )
            })
            .collect()
    }

    /// Variables as strings, in declaration order
    ///
    /// Non-string values are rendered as JSON text.
    pub fn variables(&self) -> Variables {
        self.variables
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }

    /// Add or replace a variable
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), Value::String(value.into()));
    }
}

/// Settings for the execution engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long the queue may stay empty before a phase counts as drained
    pub idle_timeout: Duration,

    /// Upper bound on a single task unit invocation (none by default)
    pub task_timeout: Option<Duration>,

    /// Priority of the first message of each phase
    pub start_priority: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            task_timeout: None,
            start_priority: crate::core::message::START_PRIORITY,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = Some(task_timeout);
        self
    }

    pub fn with_start_priority(mut self, start_priority: u32) -> Self {
        self.start_priority = start_priority;
        self
    }
}
