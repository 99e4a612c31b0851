//! Message envelope - a queued, schedulable instance of a step

use crate::core::blueprint::StepSpec;
use crate::core::result::Datum;
use crate::error::EngineError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Priority given to the first message of every phase
pub const START_PRIORITY: u32 = 10;

/// Encoding tag used for binary payloads
pub const BINARY_ENCODING: &str = "b64";

/// Unique id of a message in flight
pub type TaskToken = String;

pub fn new_token() -> TaskToken {
    Uuid::new_v4().simple().to_string()
}

/// Priority of a message spawned from a message with `priority`
///
/// Lower values are dequeued first, so each hop moves deeper work ahead
/// of siblings that are still near the top of their phase.
pub fn successor_priority(priority: u32) -> u32 {
    priority.saturating_sub(1)
}

/// A unit of work in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Step to execute
    pub task: StepSpec,

    /// Remaining steps of the phase, in order
    #[serde(default)]
    pub next_tasks: Vec<StepSpec>,

    pub task_token: TaskToken,

    pub priority: u32,

    /// Text-safe payload (binary data travels as an `{enc, raw}` record)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Message {
    /// First message of a phase
    pub fn phase_start(phase: &[StepSpec], priority: u32) -> Option<Self> {
        let (first, rest) = phase.split_first()?;
        Some(Self {
            task: first.clone(),
            next_tasks: rest.to_vec(),
            task_token: new_token(),
            priority,
            data: None,
        })
    }

    /// A successor targeting `task`, carrying one item of a parent's result
    pub fn successor(task: &StepSpec, next_tasks: &[StepSpec], priority: u32, item: Datum) -> Self {
        Self {
            task: task.clone(),
            next_tasks: next_tasks.to_vec(),
            task_token: new_token(),
            priority,
            data: Some(encode_datum(item)),
        }
    }

    pub fn to_wire(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_wire(raw: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Decoded payload for the task unit, if any
    pub fn payload(&self) -> Result<Option<Datum>, EngineError> {
        match &self.data {
            None | Some(Value::Null) => Ok(None),
            Some(value) => decode_payload(value.clone()).map(Some),
        }
    }
}

/// Make a payload text-safe
pub fn encode_datum(datum: Datum) -> Value {
    match datum {
        Datum::Json(value) => value,
        Datum::Bytes(bytes) => json!({
            "enc": BINARY_ENCODING,
            "raw": STANDARD.encode(bytes),
        }),
    }
}

/// Reverse of [`encode_datum`]
///
/// Any mapping holding both `enc` and `raw` is treated as a binary record.
pub fn decode_payload(value: Value) -> Result<Datum, EngineError> {
    let is_binary = matches!(
        &value,
        Value::Object(map) if map.contains_key("enc") && map.contains_key("raw")
    );
    if !is_binary {
        return Ok(Datum::Json(value));
    }

    let Some(encoded) = value.get("raw").and_then(Value::as_str) else {
        return Err(EngineError::Payload(
            "binary record field 'raw' must be a string".to_string(),
        ));
    };

    STANDARD
        .decode(encoded)
        .map(Datum::Bytes)
        .map_err(|e| EngineError::Payload(format!("invalid base64 in binary record: {}", e)))
}
