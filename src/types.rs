//! Core data types for the dashboard client
//!
//! This module contains the fundamental data structures shared by the
//! store, the protocol decoder and the transport client.
//!
//! # Main Types
//!
//! - [`MeasurementResult`] - One slot of the device × channel results matrix
//! - [`ChannelWaveform`] - A scaled voltage series for one (device, channel)
//! - [`ChannelKey`] - Composite `"device-channel"` key for the waveform cache
//! - [`HistoryEntry`] - A server-pushed summary of a past measurement run
//! - [`HistoricalRun`] - Stored waveforms of one past run, per channel
//! - [`MeasurementStatus`], [`WriterStatus`], [`ConnectionStatus`] - Indicators
//!
//! # Scaling
//!
//! Raw samples are 16-bit ADC codes. [`scale_sample`] converts them to
//! millivolts against a 5000 mV full-scale reference.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of devices in the default measurement grid
pub const DEFAULT_DEVICE_COUNT: u32 = 12;

/// Number of channels per device in the default measurement grid
pub const DEFAULT_CHANNEL_COUNT: u32 = 18;

/// Number of distinct codes produced by the 16-bit ADC
pub const ADC_FULL_SCALE: f64 = 65536.0;

/// ADC reference voltage in millivolts
pub const REFERENCE_MILLIVOLTS: f64 = 5000.0;

/// Convert a raw ADC code to millivolts, rounded to the nearest integer.
pub fn scale_sample(raw: f64) -> i64 {
    (raw / ADC_FULL_SCALE * REFERENCE_MILLIVOLTS).round() as i64
}

/// One slot of the device × channel results matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub device: u32,
    pub channel: u32,
    /// Last scaled sample in millivolts
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub passed: bool,
    /// Set once the slot has received at least one measurement
    #[serde(default)]
    pub tested: bool,
}

impl MeasurementResult {
    /// Create an untested slot
    pub fn untested(device: u32, channel: u32) -> Self {
        Self {
            device,
            channel,
            value: 0,
            passed: false,
            tested: false,
        }
    }

    /// Cache key for this slot
    pub fn key(&self) -> ChannelKey {
        ChannelKey::new(self.device, self.channel)
    }
}

/// A single scaled sample of a waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoltageSample {
    /// Sample index within the waveform
    pub time: u32,
    /// Scaled value in millivolts
    pub value: i64,
}

/// Scaled voltage series for one (device, channel)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelWaveform {
    pub device: u32,
    pub channel: u32,
    pub voltages: Vec<VoltageSample>,
    pub passed: bool,
}

impl ChannelWaveform {
    /// Build a waveform by scaling raw ADC codes
    pub fn from_raw(device: u32, channel: u32, raw: &[f64], passed: bool) -> Self {
        let voltages = raw
            .iter()
            .enumerate()
            .map(|(i, &v)| VoltageSample {
                time: i as u32,
                value: scale_sample(v),
            })
            .collect();
        Self {
            device,
            channel,
            voltages,
            passed,
        }
    }

    /// A waveform with no samples
    pub fn empty(device: u32, channel: u32, passed: bool) -> Self {
        Self {
            device,
            channel,
            voltages: Vec::new(),
            passed,
        }
    }

    /// Scaled value of the last sample, if any
    pub fn last_value(&self) -> Option<i64> {
        self.voltages.last().map(|s| s.value)
    }

    pub fn key(&self) -> ChannelKey {
        ChannelKey::new(self.device, self.channel)
    }
}

/// Composite cache key, rendered as `"device-channel"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey {
    pub device: u32,
    pub channel: u32,
}

impl ChannelKey {
    pub fn new(device: u32, channel: u32) -> Self {
        Self { device, channel }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.device, self.channel)
    }
}

/// Summary of a past measurement run, pushed by the server
///
/// Accepts both the camelCase field names and the snake_case names the
/// measurement server emits. The server sends `null` for fields missing from
/// its store; those read as the field's default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default, alias = "start_time", deserialize_with = "null_as_default")]
    pub timestamp: i64,
    #[serde(default, alias = "end_time", skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<i64>,
    #[serde(default, alias = "device_count", deserialize_with = "null_as_default")]
    pub device_count: u32,
    #[serde(default, alias = "channel_count", deserialize_with = "null_as_default")]
    pub channel_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

/// Deserialize a field, reading `null` as `T::default()`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl HistoryEntry {
    /// Start time as a UTC timestamp
    ///
    /// The server reports Unix seconds; values too large to be seconds are
    /// read as milliseconds.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        if self.timestamp.abs() >= 100_000_000_000 {
            Utc.timestamp_millis_opt(self.timestamp).single()
        } else {
            Utc.timestamp_opt(self.timestamp, 0).single()
        }
    }
}

/// Device or channel id that the server may send as a number or a string
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(u32),
    Text(String),
}

fn wire_id<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<WireId>::deserialize(deserializer)? {
        Some(WireId::Number(id)) => Some(id),
        Some(WireId::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

/// One stored sample of a past run, as returned for `getHistoricalData`
///
/// The store keeps device and channel ids as tags, so they arrive as
/// strings. Any field may be `null`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoricalSample {
    #[serde(default, deserialize_with = "wire_id")]
    pub device: Option<u32>,
    #[serde(default, deserialize_with = "wire_id")]
    pub channel: Option<u32>,
    /// Unix seconds
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: i64,
    /// Raw ADC code
    #[serde(default)]
    pub value: Option<f64>,
}

/// Stored waveforms of one past run, keyed by channel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoricalRun {
    pub history_id: Option<i64>,
    pub waveforms: BTreeMap<ChannelKey, ChannelWaveform>,
}

impl HistoricalRun {
    /// Group samples by channel and scale them
    ///
    /// Samples keep their arrival order within a channel; the server sorts
    /// them by time. Samples without a device, channel or value are dropped.
    pub fn from_samples(history_id: Option<i64>, samples: &[HistoricalSample]) -> Self {
        let mut raw: BTreeMap<ChannelKey, Vec<f64>> = BTreeMap::new();
        for sample in samples {
            if let (Some(device), Some(channel), Some(value)) =
                (sample.device, sample.channel, sample.value)
            {
                raw.entry(ChannelKey::new(device, channel))
                    .or_default()
                    .push(value);
            }
        }

        let waveforms = raw
            .into_iter()
            .map(|(key, values)| {
                let waveform = ChannelWaveform::from_raw(key.device, key.channel, &values, false);
                (key, waveform)
            })
            .collect();
        Self {
            history_id,
            waveforms,
        }
    }

    /// Total number of samples across all channels
    pub fn sample_count(&self) -> usize {
        self.waveforms.values().map(|w| w.voltages.len()).sum()
    }
}

/// Overall measurement run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementStatus {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl MeasurementStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, MeasurementStatus::Running)
    }
}

impl FromStr for MeasurementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stopped" | "completed" => Ok(MeasurementStatus::Stopped),
            "running" | "in_progress" => Ok(MeasurementStatus::Running),
            "paused" => Ok(MeasurementStatus::Paused),
            other => Err(format!("Unknown measurement status '{}'", other)),
        }
    }
}

impl fmt::Display for MeasurementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementStatus::Stopped => write!(f, "Stopped"),
            MeasurementStatus::Running => write!(f, "Running"),
            MeasurementStatus::Paused => write!(f, "Paused"),
        }
    }
}

/// State of the server-side process persisting results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriterStatus {
    #[default]
    Waiting,
    Writing,
}

impl fmt::Display for WriterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterStatus::Waiting => write!(f, "Waiting"),
            WriterStatus::Writing => write!(f, "Writing"),
        }
    }
}

/// Connection status to the measurement server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Not connected
    #[default]
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection error occurred
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting..."),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Error => write!(f, "Error"),
        }
    }
}
