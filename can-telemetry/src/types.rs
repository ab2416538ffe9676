//! Core types for the telemetry pipeline
//!
//! This module defines the values that flow through the pipeline: the raw frame
//! recovered from a datagram, the decoded signal update that is published to
//! viewers, and the error taxonomy shared by every stage.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Timestamp in seconds since the UNIX epoch (fractional)
pub type Timestamp = f64;

/// Current wall-clock time as a [`Timestamp`]
pub fn now_timestamp() -> Timestamp {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1_000_000_000.0
}

/// Raw CAN frame recovered from one datagram
///
/// Produced by the frame parser and discarded once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// CAN message ID (11-bit or 29-bit, carried as up to 8 hex digits)
    pub frame_id: u32,
    /// Payload bytes
    pub payload: Vec<u8>,
}

impl RawFrame {
    /// Create a new raw frame
    pub fn new(frame_id: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            frame_id,
            payload: payload.into(),
        }
    }

    /// Get the data length code (DLC) - number of payload bytes
    pub fn dlc(&self) -> usize {
        self.payload.len()
    }

    /// Group identifier carried in the first payload byte
    pub fn pack_id(&self) -> Option<u8> {
        self.payload.first().copied()
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X} [{}]", self.frame_id, hex::encode_upper(&self.payload))
    }
}

/// A decoded, scaled and named signal value - the unit of distribution
///
/// Serializes to the JSON object pushed to viewers:
/// `{"name": ..., "value": ..., "unit": ..., "timestamp": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalUpdate {
    /// Published name, e.g. `group-1-voltage-3`
    pub name: String,
    /// Physical value (raw value multiplied by the signal scale)
    pub value: f64,
    /// Engineering unit (may be empty)
    pub unit: String,
    /// Decode time in seconds since the UNIX epoch
    pub timestamp: Timestamp,
}

impl SignalUpdate {
    /// Create an update stamped with the current time
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self::with_timestamp(name, value, unit, now_timestamp())
    }

    /// Create an update with an explicit timestamp
    pub fn with_timestamp(
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            timestamp,
        }
    }
}

impl fmt::Display for SignalUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{} = {:.3}", self.name, self.value)
        } else {
            write!(f, "{} = {:.3} {}", self.name, self.value, self.unit)
        }
    }
}

/// Reasons a datagram cannot be turned into a [`RawFrame`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Datagram is not valid UTF-8 text")]
    InvalidUtf8,

    #[error("No CAN frame pattern found in {0:?}")]
    NoFrame(String),

    #[error("Invalid frame ID: {0}")]
    InvalidFrameId(String),

    #[error("Invalid payload hex: {0}")]
    InvalidHex(String),
}

/// Errors that can occur in the pipeline
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to parse datagram: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid signal map: {0}")]
    Config(String),

    #[error("Failed to bind UDP socket on {addr} after {attempts} attempt(s): {source}")]
    Bind {
        addr: SocketAddr,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Distribution channel closed")]
    ChannelClosed,

    #[error("Worker thread '{0}' panicked")]
    WorkerPanicked(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
