//! Wire protocol for the measurement server
//!
//! Inbound frames are JSON text. [`decode`] turns a frame into an
//! [`InboundMessage`] by trying each known shape in a fixed priority order:
//!
//! 1. single measurement update: `{device, channel, voltages, passed}`
//! 2. batch update: `{results: [...]}`
//! 3. status: `{status, history?, message?}`
//! 4. legacy: `{type: "measurement_results" | "measurement_status", ...}`
//!
//! A frame carrying a `type` field is always treated as legacy, so the
//! legacy `results`/`status` fields never shadow it. The `historicalData`
//! reply also carries `results`, but its elements are stored samples of a
//! past run rather than live updates, so it is decoded as a status before
//! the batch shape is tried. Frames that match none
//! of the shapes are rejected with [`DashboardError::Protocol`].
//!
//! Outbound frames are any `Serialize` value; [`Command`] covers the actions
//! the server understands.

use crate::error::{DashboardError, Result};
use crate::types::{HistoricalSample, HistoryEntry, MeasurementResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw measurement for one (device, channel)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementUpdate {
    pub device: u32,
    pub channel: u32,
    /// Raw 16-bit ADC codes
    pub voltages: Vec<f64>,
    #[serde(default)]
    pub passed: bool,
}

/// Status reported by the server
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    /// A measurement run is in progress
    InProgress,
    /// Results are being written to storage
    Writing,
    /// The run (and its storage write) finished
    Completed,
    /// Snapshot of past runs
    MeasurementHistory(Vec<HistoryEntry>),
    /// Stored samples of one past run, the reply to `getHistoricalData`
    HistoricalData {
        history_id: Option<i64>,
        samples: Vec<HistoricalSample>,
    },
    /// Server-side failure
    Error(Option<String>),
    /// Status string this client does not act on
    Other(String),
}

/// Frames from older servers, tagged with `type`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegacyMessage {
    /// Replace the full results matrix
    MeasurementResults { results: Vec<MeasurementResult> },
    /// Set the measurement status
    MeasurementStatus { status: String },
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Measurement(MeasurementUpdate),
    Batch {
        updates: Vec<MeasurementUpdate>,
        /// Elements of the results list that were not measurement updates
        skipped: usize,
    },
    Status(StatusMessage),
    Legacy(LegacyMessage),
}

#[derive(Deserialize)]
struct StatusFrame {
    status: String,
    #[serde(default)]
    history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    message: Option<String>,
}

const HISTORICAL_DATA: &str = "historicalData";

#[derive(Deserialize)]
struct HistoricalFrame {
    #[serde(default, rename = "historyID")]
    history_id: Option<i64>,
    #[serde(default)]
    results: Option<Vec<HistoricalSample>>,
}

impl From<StatusFrame> for StatusMessage {
    fn from(frame: StatusFrame) -> Self {
        match frame.status.as_str() {
            "in_progress" => StatusMessage::InProgress,
            "writing" => StatusMessage::Writing,
            "completed" => StatusMessage::Completed,
            "measurementHistory" => {
                StatusMessage::MeasurementHistory(frame.history.unwrap_or_default())
            }
            "error" => StatusMessage::Error(frame.message),
            _ => StatusMessage::Other(frame.status),
        }
    }
}

/// Decode one inbound text frame
pub fn decode(text: &str) -> Result<InboundMessage> {
    let value: Value = serde_json::from_str(text)?;
    decode_value(&value)
}

/// Decode an already-parsed frame
pub fn decode_value(value: &Value) -> Result<InboundMessage> {
    let Some(object) = value.as_object() else {
        return Err(DashboardError::Protocol(format!(
            "expected a JSON object, got {}",
            json_kind(value)
        )));
    };
    let tagged = object.contains_key("type");

    if let Ok(update) = MeasurementUpdate::deserialize(value) {
        return Ok(InboundMessage::Measurement(update));
    }

    if !tagged {
        if object.get("status").and_then(Value::as_str) == Some(HISTORICAL_DATA) {
            let frame = HistoricalFrame::deserialize(value).map_err(|e| {
                DashboardError::Protocol(format!("invalid historicalData frame: {}", e))
            })?;
            return Ok(InboundMessage::Status(StatusMessage::HistoricalData {
                history_id: frame.history_id,
                samples: frame.results.unwrap_or_default(),
            }));
        }

        if let Some(Value::Array(results)) = object.get("results") {
            let updates: Vec<MeasurementUpdate> = results
                .iter()
                .filter_map(|r| MeasurementUpdate::deserialize(r).ok())
                .collect();
            let skipped = results.len() - updates.len();
            return Ok(InboundMessage::Batch { updates, skipped });
        }

        if object.contains_key("status") {
            return StatusFrame::deserialize(value)
                .map(|frame| InboundMessage::Status(frame.into()))
                .map_err(|e| DashboardError::Protocol(format!("invalid status frame: {}", e)));
        }
    }

    if tagged {
        return LegacyMessage::deserialize(value)
            .map(InboundMessage::Legacy)
            .map_err(|e| DashboardError::Protocol(format!("unrecognized legacy frame: {}", e)));
    }

    Err(DashboardError::Protocol(
        "frame matches no known message shape".to_string(),
    ))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Serialize an outbound message to JSON text
pub fn encode<T: Serialize + ?Sized>(message: &T) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}

/// Actions understood by the measurement server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Start,
    Pause,
    Resume,
    Stop,
    GetMeasurementHistory,
    GetHistoricalData,
}

/// Outbound command frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Command {
    fn bare(action: Action) -> Self {
        Self {
            action,
            devices: Vec::new(),
            channels: Vec::new(),
            params: None,
        }
    }

    /// Start measuring the given devices and channels
    pub fn start(devices: impl IntoIterator<Item = u32>, channels: impl IntoIterator<Item = u32>) -> Self {
        Self {
            devices: devices.into_iter().collect(),
            channels: channels.into_iter().collect(),
            ..Self::bare(Action::Start)
        }
    }

    pub fn pause() -> Self {
        Self::bare(Action::Pause)
    }

    pub fn resume() -> Self {
        Self::bare(Action::Resume)
    }

    pub fn stop() -> Self {
        Self::bare(Action::Stop)
    }

    /// Ask the server to push a `measurementHistory` status frame
    pub fn measurement_history() -> Self {
        Self::bare(Action::GetMeasurementHistory)
    }

    /// Ask the server for the stored samples of one past run
    pub fn historical_data(history_id: i64) -> Self {
        Self {
            params: Some(serde_json::json!({ "historyID": history_id })),
            ..Self::bare(Action::GetHistoricalData)
        }
    }
}
