//! Command task - runs an external executable as a task unit
//!
//! The options bag is written to the child's stdin as JSON:
//! `{"params": {...}, "data": ...}` (binary data as an `{enc, raw}` record).
//! The child prints its result as JSON on stdout:
//!
//! ```json
//! {"data": {"many": ["a", "b"]}, "skip": "x", "sentinel": ["dir"], "logs": [], "metrics": {}}
//! ```
//!
//! `data` and `skip` take a bare value, `{"many": [...]}` or `{"partial": [...]}`.
//! Empty stdout or `null` means the task produced no result.

use crate::core::message::encode_datum;
use crate::core::result::{Datum, Output, TaskResult};
use crate::error::TaskError;
use crate::tasks::{TaskContext, TaskOptions, TaskUnit};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Task unit backed by an external executable
#[derive(Debug, Clone)]
pub struct CommandTask {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandTask {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl TaskUnit for CommandTask {
    async fn run(&self, options: TaskOptions, ctx: &TaskContext) -> Result<Option<TaskResult>, TaskError> {
        let input = serde_json::to_vec(&options_to_json(options))
            .map_err(|e| TaskError::Failed(format!("Failed to encode task options: {}", e)))?;

        debug!("Spawning task command {}", self.program.display());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Stdin is written while stdout is drained; a child may fill its output pipe first
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A child that exits without reading its input is judged by its exit status
                match stdin.write_all(&input).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
                // Dropping stdin closes the pipe so the child sees EOF
            }
            Ok::<(), std::io::Error>(())
        };

        let (fed, output) = tokio::select! {
            both = async { tokio::join!(feed, child.wait_with_output()) } => both,
            _ = ctx.cancelled() => return Err(TaskError::Cancelled),
        };
        fed?;
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(
                "{} exited with code {}: {}",
                self.program.display(),
                exit_code,
                stderr.trim()
            );
            return Err(TaskError::Failed(format!(
                "{} exited with code {}: {}",
                self.program.display(),
                exit_code,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| TaskError::Failed(format!("Failed to decode task output: {}", e)))?;

        debug!("Task command returned {} bytes of output", stdout.len());
        parse_result(&stdout)
    }
}

fn options_to_json(options: TaskOptions) -> Value {
    let mut map = Map::new();
    if let Some(params) = options.params {
        map.insert("params".to_string(), Value::Object(params));
    }
    if let Some(data) = options.data {
        map.insert("data".to_string(), encode_datum(data));
    }
    Value::Object(map)
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    data: Option<WireOutput>,
    #[serde(default)]
    skip: Option<WireOutput>,
    #[serde(default)]
    sentinel: Option<Value>,
    #[serde(default)]
    logs: Option<Value>,
    #[serde(default)]
    metrics: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireOutput {
    Many { many: Vec<Value> },
    Partial { partial: Vec<Value> },
    Single(Value),
}

impl From<WireOutput> for Output {
    fn from(wire: WireOutput) -> Self {
        match wire {
            WireOutput::Many { many } => Output::Batch(many.into_iter().map(Datum::Json).collect()),
            WireOutput::Partial { partial } => {
                Output::Streamed(partial.into_iter().map(Datum::Json).collect())
            }
            WireOutput::Single(value) => Output::Single(Datum::Json(value)),
        }
    }
}

/// Parse the JSON a task command printed
pub fn parse_result(stdout: &str) -> Result<Option<TaskResult>, TaskError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let wire: Option<WireResult> = serde_json::from_str(trimmed)
        .map_err(|e| TaskError::Failed(format!("Task output is not a valid result: {}", e)))?;

    Ok(wire.map(|w| TaskResult {
        data: w.data.map(Output::from),
        skip: w.skip.map(Output::from),
        sentinel: w.sentinel,
        logs: w.logs,
        metrics: w.metrics,
    }))
}
