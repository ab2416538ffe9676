//! Signal map
//!
//! Maps a CAN frame ID to the ordered list of signals packed into its payload.
//! The map is built once at startup and shared read-only by the decoder.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// Name of the definition that describes the group identifier byte
pub const PACK_ID_SIGNAL: &str = "pack_id";

/// Number of distinct group identifiers a single payload byte can carry
const PACK_ID_SPACE: usize = 256;

/// A signal definition
///
/// `start` and `length` are byte units: the signal occupies
/// `payload[start..start + length]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Offset of the first byte in the payload
    pub start: usize,
    /// Length in bytes
    pub length: usize,
    /// Scale factor to convert raw value to physical value
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Engineering unit (e.g., "mV", "°C")
    #[serde(default)]
    pub unit: String,
}

fn default_scale() -> f64 {
    1.0
}

impl SignalDefinition {
    /// Create an unscaled, unitless signal definition
    pub fn new(name: impl Into<String>, start: usize, length: usize) -> Self {
        Self {
            name: name.into(),
            start,
            length,
            scale: default_scale(),
            unit: String::new(),
        }
    }

    /// Builder method: set the scale factor
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Builder method: set the engineering unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// True if this definition describes the group identifier byte
    pub fn is_pack_id(&self) -> bool {
        self.name == PACK_ID_SIGNAL
    }

    /// Exclusive end offset of the signal in the payload
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.length)
    }

    /// Dashboard-facing name: `cell_<n>` becomes `voltage-<n>`, `temp_<n>`
    /// becomes `temp-<n>`, anything else is kept as-is.
    pub fn display_name(&self) -> Cow<'_, str> {
        let index = || self.name.split('_').nth(1).unwrap_or_default();

        if self.name.starts_with("cell_") {
            Cow::Owned(format!("voltage-{}", index()))
        } else if self.name.starts_with("temp_") {
            Cow::Owned(format!("temp-{}", index()))
        } else {
            Cow::Borrowed(&self.name)
        }
    }
}

/// All signals carried by one frame ID
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDefinition {
    /// CAN frame ID
    pub id: u32,
    /// Signals in declaration order
    pub signals: Vec<SignalDefinition>,
}

impl FrameDefinition {
    pub fn new(id: u32, signals: Vec<SignalDefinition>) -> Self {
        Self { id, signals }
    }

    /// Signals that produce published updates (everything except `pack_id`)
    pub fn reportable_signals(&self) -> impl Iterator<Item = &SignalDefinition> {
        self.signals.iter().filter(|s| !s.is_pack_id())
    }
}

/// The signal map: frame ID to frame definition
#[derive(Debug, Clone, Default)]
pub struct SignalMap {
    frames: HashMap<u32, FrameDefinition>,
}

impl SignalMap {
    /// Create a new empty signal map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame definition, replacing any earlier one with the same ID
    pub fn add_frame(&mut self, frame: FrameDefinition) {
        if let Some(previous) = self.frames.insert(frame.id, frame) {
            log::warn!("Frame 0x{:X} defined twice, keeping the later definition", previous.id);
        }
    }

    /// Get the frame definition for a given frame ID
    pub fn get_frame(&self, frame_id: u32) -> Option<&FrameDefinition> {
        self.frames.get(&frame_id)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Get all frame IDs in the map, sorted
    pub fn frame_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.frames.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Upper bound on the number of distinct published names this map can
    /// produce (every reportable signal name under every possible group ID)
    pub fn max_distinct_names(&self) -> usize {
        let names: HashSet<Cow<'_, str>> = self
            .frames
            .values()
            .flat_map(|frame| frame.reportable_signals())
            .map(|signal| signal.display_name())
            .collect();
        names.len() * PACK_ID_SPACE
    }

    /// Get map statistics
    pub fn stats(&self) -> MapStats {
        MapStats {
            num_frames: self.frames.len(),
            num_signals: self.frames.values().map(|f| f.signals.len()).sum(),
        }
    }
}

/// Signal map statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MapStats {
    /// Total number of frame definitions
    pub num_frames: usize,
    /// Total number of signal definitions (including `pack_id`)
    pub num_signals: usize,
}
