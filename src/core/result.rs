//! Task unit results

use serde_json::Value;

/// A single payload value: structured JSON or raw bytes
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Json(Value),
    Bytes(Vec<u8>),
}

impl Datum {
    /// Whether this value counts as "no data" for successor creation
    ///
    /// `null`, empty strings, empty arrays, empty objects and empty byte
    /// strings are empty. Numbers and booleans never are.
    pub fn is_empty(&self) -> bool {
        match self {
            Datum::Json(Value::Null) => true,
            Datum::Json(Value::String(s)) => s.is_empty(),
            Datum::Json(Value::Array(a)) => a.is_empty(),
            Datum::Json(Value::Object(o)) => o.is_empty(),
            Datum::Json(_) => false,
            Datum::Bytes(b) => b.is_empty(),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Datum::Json(v) => Some(v),
            Datum::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Datum::Bytes(b) => Some(b),
            Datum::Json(_) => None,
        }
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Json(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Json(Value::from(value))
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Datum::Json(Value::from(value))
    }
}

impl From<Vec<u8>> for Datum {
    fn from(value: Vec<u8>) -> Self {
        Datum::Bytes(value)
    }
}

/// Shape of `Result.data` / `Result.skip`
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// One value, one successor
    Single(Datum),
    /// Fan-out, successors queued together once the result is interpreted
    Batch(Vec<Datum>),
    /// Fan-out, each successor queued as soon as it is taken from the list
    Streamed(Vec<Datum>),
}

impl Output {
    pub fn single(value: impl Into<Datum>) -> Self {
        Output::Single(value.into())
    }

    pub fn batch<I, D>(items: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Datum>,
    {
        Output::Batch(items.into_iter().map(Into::into).collect())
    }

    pub fn streamed<I, D>(items: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Datum>,
    {
        Output::Streamed(items.into_iter().map(Into::into).collect())
    }

    /// Whether this output produces no successor at all
    pub fn is_empty(&self) -> bool {
        match self {
            Output::Single(d) => d.is_empty(),
            Output::Batch(items) | Output::Streamed(items) => items.is_empty(),
        }
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self, Output::Streamed(_))
    }

    /// Flatten into the list of successor payloads
    pub fn into_items(self) -> Vec<Datum> {
        match self {
            Output::Single(d) if d.is_empty() => Vec::new(),
            Output::Single(d) => vec![d],
            Output::Batch(items) | Output::Streamed(items) => items,
        }
    }
}

/// What a task unit hands back to the dispatcher
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskResult {
    /// Payload(s) for the next step of the phase
    pub data: Option<Output>,

    /// Free-form log lines from the task
    pub logs: Option<Value>,

    /// Free-form metrics from the task
    pub metrics: Option<Value>,

    /// Pipeline-wide value; must be a list, only its first element is kept
    pub sentinel: Option<Value>,

    /// Payload(s) for the step named by `skip_to`
    pub skip: Option<Output>,
}

impl TaskResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(mut self, data: Output) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_skip(mut self, skip: Output) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_sentinel<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.sentinel = Some(Value::Array(values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with_logs(mut self, logs: Value) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn with_metrics(mut self, metrics: Value) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
