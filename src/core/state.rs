//! Run state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Overall pipeline run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is draining the queue
    Running,
    /// Every phase finished
    Completed,
    /// A task unit or the scheduler aborted the run
    Failed,
    /// Interrupted by the operator
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// Summary of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run ID
    pub run_id: Uuid,

    /// Job name, if the job file declared one
    pub name: Option<String>,

    pub status: RunStatus,

    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: Option<DateTime<Utc>>,

    pub phases_total: usize,

    /// Phases whose work fully drained
    pub phases_completed: usize,

    /// Messages handed to task units
    pub tasks_dispatched: usize,

    /// Successor messages created by fan-out and skip branches
    pub messages_spawned: usize,

    /// Sentinel value at the end of the run
    pub sentinel: Option<Value>,

    /// Elements of the last sentinel list beyond the first, for follow-up runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_sentinels: Vec<Value>,

    /// Error message when the run failed
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(name: Option<String>, phases_total: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            name,
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
            phases_total,
            phases_completed: 0,
            tasks_dispatched: 0,
            messages_spawned: 0,
            sentinel: None,
            pending_sentinels: Vec::new(),
            error: None,
        }
    }

    /// Mark run as started
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark run as completed
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Mark run as failed
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = RunStatus::Cancelled;
        self.finished_at = Some(Utc::now());
    }

    /// Completed share of phases (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.phases_total == 0 {
            return 0.0;
        }
        self.phases_completed as f64 / self.phases_total as f64
    }

    pub fn duration(&self) -> Option<std::time::Duration> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        finished.signed_duration_since(started).to_std().ok()
    }
}
