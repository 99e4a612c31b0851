//! Variable resolution - expands `<name>` tokens in step parameters
//!
//! Resolution happens once, before a run starts:
//! 1. System variables (`$WORKING_DIR`, `$JOB_DATE`, `$JOB_START`,
//!    `$LAST_SUCCESSFUL_RUN`) are substituted into every user variable value.
//! 2. Every top-level string parameter of every step has each `<name>`
//!    token replaced, one user variable at a time in declaration order.
//!
//! Unknown tokens are left verbatim.

use crate::core::blueprint::Blueprint;
use chrono::{DateTime, Local, SecondsFormat};
use indexmap::IndexMap;
use serde_json::Value;

pub const WORKING_DIR: &str = "$WORKING_DIR";
pub const JOB_DATE: &str = "$JOB_DATE";
pub const JOB_START: &str = "$JOB_START";
pub const LAST_SUCCESSFUL_RUN: &str = "$LAST_SUCCESSFUL_RUN";

/// User variables, in declaration order
pub type Variables = IndexMap<String, String>;

/// System-provided job variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobVariables {
    pub working_dir: Option<String>,
    pub job_date: String,
    pub job_start: String,
    pub last_successful_run: String,
}

impl JobVariables {
    /// Build the job variables for a run starting at `now`
    pub fn at(working_dir: Option<&str>, now: DateTime<Local>) -> Self {
        Self {
            working_dir: working_dir.filter(|d| !d.is_empty()).map(str::to_string),
            job_date: now.format("%Y-%m-%d").to_string(),
            job_start: now.to_rfc3339_opts(SecondsFormat::Micros, false),
            last_successful_run: String::new(),
        }
    }

    pub fn now(working_dir: Option<&str>) -> Self {
        Self::at(working_dir, Local::now())
    }

    pub fn with_last_successful_run(mut self, marker: impl Into<String>) -> Self {
        self.last_successful_run = marker.into();
        self
    }

    /// Token/value pairs in substitution order
    pub fn tokens(&self) -> Vec<(&'static str, &str)> {
        let mut tokens = Vec::with_capacity(4);
        if let Some(dir) = &self.working_dir {
            tokens.push((WORKING_DIR, dir.as_str()));
        }
        tokens.push((JOB_DATE, self.job_date.as_str()));
        tokens.push((JOB_START, self.job_start.as_str()));
        tokens.push((LAST_SUCCESSFUL_RUN, self.last_successful_run.as_str()));
        tokens
    }

    /// Replace every system token occurring in `value`
    pub fn expand(&self, value: &str) -> String {
        self.tokens()
            .into_iter()
            .fold(value.to_string(), |acc, (token, replacement)| {
                acc.replace(token, replacement)
            })
    }
}

/// Expand system variables inside user variable values
///
/// Returns a map keyed by the wrapped token (`<name>`).
pub fn expand_user_variables(variables: &Variables, job: &JobVariables) -> IndexMap<String, String> {
    variables
        .iter()
        .map(|(name, value)| (format!("<{}>", name), job.expand(value)))
        .collect()
}

/// Resolve a blueprint against user variables, using the current time
pub fn resolve(blueprint: Blueprint, variables: &Variables, working_dir: Option<&str>) -> Blueprint {
    resolve_with(blueprint, variables, &JobVariables::now(working_dir))
}

/// Resolve a blueprint against user variables and explicit job variables
pub fn resolve_with(mut blueprint: Blueprint, variables: &Variables, job: &JobVariables) -> Blueprint {
    let tokens = expand_user_variables(variables, job);

    for step in blueprint.phases.iter_mut().flatten() {
        let Some(params) = step.params.as_mut() else {
            continue;
        };
        for value in params.values_mut() {
            if let Value::String(s) = value {
                for (token, replacement) in &tokens {
                    if s.contains(token.as_str()) {
                        *s = s.replace(token.as_str(), replacement);
                    }
                }
            }
        }
    }

    blueprint
}
