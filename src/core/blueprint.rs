//! Blueprint domain model - ordered phases of ordered steps

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single declared unit of work within a phase
///
/// Steps have no global identity: the same task id may appear several
/// times, and a step is addressed by its position inside its phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Task identifier (dotted path resolved through the task registry)
    pub id: String,

    /// Human-readable step name
    #[serde(default)]
    pub name: String,

    /// Parameters handed to the task unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,

    /// Task id of a later step in the same phase that receives `Result.skip`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_to: Option<String>,

    /// Replace the incoming data with the pipeline sentinel, if one is set
    #[serde(
        default,
        rename = "passSentinel",
        alias = "pass_sentinel",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub pass_sentinel: bool,
}

impl StepSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            params: None,
            skip_to: None,
            pass_sentinel: false,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_skip_to(mut self, target: impl Into<String>) -> Self {
        self.skip_to = Some(target.into());
        self
    }

    pub fn with_pass_sentinel(mut self) -> Self {
        self.pass_sentinel = true;
        self
    }

    /// Display label used in logs and events
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// A barrier-separated stage of the pipeline
pub type Phase = Vec<StepSpec>;

/// Declarative description of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub phases: Vec<Phase>,
}

impl Blueprint {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self { phases }
    }

    pub fn phase(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// All steps of all phases, in declaration order
    pub fn steps(&self) -> impl Iterator<Item = &StepSpec> {
        self.phases.iter().flatten()
    }

    /// Steps whose `skip_to` does not name any later step of the same phase
    ///
    /// Such a skip branch never fires at run time. Returned as
    /// `(phase index, step index, skip_to)`.
    pub fn unmatched_skip_targets(&self) -> Vec<(usize, usize, &str)> {
        let mut unmatched = Vec::new();
        for (phase_idx, phase) in self.phases.iter().enumerate() {
            for (step_idx, step) in phase.iter().enumerate() {
                if let Some(target) = step.skip_to.as_deref() {
                    let found = phase[step_idx + 1..].iter().any(|s| s.id == target);
                    if !found {
                        unmatched.push((phase_idx, step_idx, target));
                    }
                }
            }
        }
        unmatched
    }
}
