//! Task units - the pluggable work the orchestrator drives

pub mod builtin;
pub mod command;

use crate::core::blueprint::Blueprint;
use crate::core::result::{Datum, TaskResult};
use crate::error::TaskError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

pub use command::CommandTask;

/// Namespace tried when a task id does not resolve as given
pub const TASK_NAMESPACE: &str = "pipelines";

/// Options bag handed to a task unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOptions {
    /// Step parameters from the blueprint
    pub params: Option<Map<String, Value>>,

    /// Incoming payload (or the sentinel for `passSentinel` steps)
    pub data: Option<Datum>,
}

impl TaskOptions {
    /// Look up a parameter
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.get(name))
    }

    /// Look up a parameter that the task cannot run without
    pub fn require_param(&self, name: &str) -> Result<&Value, TaskError> {
        self.param(name)
            .ok_or_else(|| TaskError::MissingParam(name.to_string()))
    }
}

/// Per-invocation context: cancellation signal and time budget
#[derive(Debug, Clone)]
pub struct TaskContext {
    cancel: watch::Receiver<bool>,
    timeout: Option<Duration>,
}

impl TaskContext {
    pub fn new(cancel: watch::Receiver<bool>, timeout: Option<Duration>) -> Self {
        Self { cancel, timeout }
    }

    /// A context that is never cancelled and has no time budget
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(rx, None)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once the run is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        let observed = rx.wait_for(|cancelled| *cancelled).await.map(|_| ());
        // A dropped sender means nobody can cancel any more
        if observed.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// A loadable unit of work identified by a string id
#[async_trait]
pub trait TaskUnit: Send + Sync {
    /// Run the task; `Ok(None)` means the task produced no result at all
    async fn run(&self, options: TaskOptions, ctx: &TaskContext) -> Result<Option<TaskResult>, TaskError>;
}

/// Maps task ids to task units
#[derive(Clone, Default)]
pub struct TaskRegistry {
    units: BTreeMap<String, Arc<dyn TaskUnit>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in example tasks
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Register a task unit, replacing any unit with the same id
    pub fn register<T: TaskUnit + 'static>(&mut self, id: impl Into<String>, unit: T) {
        self.register_arc(id, Arc::new(unit));
    }

    pub fn register_arc(&mut self, id: impl Into<String>, unit: Arc<dyn TaskUnit>) {
        let id = id.into();
        debug!("Registering task unit: {}", id);
        self.units.insert(id, unit);
    }

    /// Resolve an id as given, then under the task namespace
    pub fn resolve(&self, id: &str) -> Option<Arc<dyn TaskUnit>> {
        self.units
            .get(id)
            .or_else(|| self.units.get(&format!("{}.{}", TASK_NAMESPACE, id)))
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resolve(id).is_some()
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        self.units.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Task ids used by the blueprint that would fail to resolve
    pub fn unresolved<'a>(&self, blueprint: &'a Blueprint) -> Vec<&'a str> {
        let mut missing: Vec<&str> = blueprint
            .steps()
            .map(|s| s.id.as_str())
            .filter(|id| !self.contains(id))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }

    /// Register every executable under `dir` as a command task
    ///
    /// `dir/fs/move_dir.sh` becomes `pipelines.fs.move_dir`. Returns the
    /// number of units registered.
    pub fn discover(&mut self, dir: impl AsRef<Path>) -> std::io::Result<usize> {
        let root = dir.as_ref();
        let mut found = Vec::new();
        collect_executables(root, &mut found)?;

        let mut count = 0;
        for path in found {
            let Some(id) = task_id_for(root, &path) else {
                continue;
            };
            self.register(id, CommandTask::new(path));
            count += 1;
        }
        Ok(count)
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("units", &self.ids())
            .finish()
    }
}

fn collect_executables(dir: &Path, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_executables(&path, found)?;
        } else if file_type.is_file() && is_executable(&entry.metadata()?) {
            found.push(path);
        }
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

fn task_id_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let mut parts = vec![TASK_NAMESPACE.to_string()];
    for component in relative.components() {
        parts.push(component.as_os_str().to_str()?.to_string());
    }
    Some(parts.join("."))
}
