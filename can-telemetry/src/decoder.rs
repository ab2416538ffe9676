//! Main decoder API
//!
//! The Decoder wraps the signal map and turns raw frames into signal updates.
//! It is stateless apart from the (immutable) map, so one instance can be
//! shared freely between threads.

use crate::message_decoder::MessageDecoder;
use crate::signals::SignalMap;
use crate::types::{now_timestamp, RawFrame, Result, SignalUpdate};
use crate::wire::FrameParser;
use std::path::Path;
use std::sync::Arc;

/// The main decoder struct - entry point for all decoding operations
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    signal_map: Arc<SignalMap>,
}

impl Decoder {
    /// Create a decoder with an empty signal map (decodes nothing)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder over an already loaded signal map
    pub fn with_map(signal_map: SignalMap) -> Self {
        Self {
            signal_map: Arc::new(signal_map),
        }
    }

    /// Create a decoder from a signal map file
    ///
    /// # Example
    /// ```no_run
    /// use can_telemetry::Decoder;
    /// use std::path::Path;
    ///
    /// let decoder = Decoder::from_map_file(Path::new("can_map.json")).unwrap();
    /// ```
    pub fn from_map_file(path: &Path) -> Result<Self> {
        Ok(Self::with_map(SignalMap::from_json_file(path)?))
    }

    /// Decode a frame into signal updates
    ///
    /// Returns `None` when the frame ID is not in the signal map. Unknown IDs
    /// are expected bus noise, not errors.
    pub fn decode(&self, frame: &RawFrame) -> Option<Vec<SignalUpdate>> {
        let Some(frame_def) = self.signal_map.get_frame(frame.frame_id) else {
            log::trace!("Unknown frame ID: 0x{:X}, ignoring", frame.frame_id);
            return None;
        };

        let updates = MessageDecoder::decode_frame(frame, frame_def, now_timestamp());
        for update in &updates {
            log::debug!("Processed signal: {}", update);
        }
        Some(updates)
    }

    /// Parse and decode one datagram
    ///
    /// Convenience wrapper for callers that do not need to distinguish the
    /// stages; the listener keeps them separate to maintain its counters.
    pub fn decode_datagram(&self, datagram: &[u8]) -> Result<Vec<SignalUpdate>> {
        let frame = FrameParser::parse(datagram)?;
        Ok(self.decode(&frame).unwrap_or_default())
    }

    /// The signal map this decoder reads from
    pub fn signal_map(&self) -> &SignalMap {
        &self.signal_map
    }

    /// Get statistics about the loaded signal map
    pub fn map_stats(&self) -> MapStats {
        self.signal_map.stats()
    }
}

// Re-export MapStats for public API
pub use crate::signals::MapStats;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{FrameDefinition, SignalDefinition};
    use crate::types::TelemetryError;

    fn battery_decoder() -> Decoder {
        let mut map = SignalMap::new();
        map.add_frame(FrameDefinition::new(
            0x12905301,
            vec![
                SignalDefinition::new("pack_id", 0, 1),
                SignalDefinition::new("cell_1", 1, 2).with_unit("mV"),
                SignalDefinition::new("cell_2", 3, 2).with_unit("mV"),
            ],
        ));
        Decoder::with_map(map)
    }

    #[test]
    fn test_decoder_creation() {
        let decoder = Decoder::new();
        let stats = decoder.map_stats();
        assert_eq!(stats.num_frames, 0);
        assert_eq!(stats.num_signals, 0);
    }

    #[test]
    fn test_unknown_frame_yields_none() {
        let decoder = battery_decoder();
        assert!(decoder.decode(&RawFrame::new(0x0A7, vec![0x01, 0x02])).is_none());
        assert!(decoder.decode_datagram(b"A7:0102").unwrap().is_empty());
    }

    #[test]
    fn test_known_frame_decodes() {
        let decoder = battery_decoder();
        let updates = decoder.decode_datagram(b"12905301:042C01E803").unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].name, "group-4-voltage-1");
        assert_eq!(updates[0].value, 300.0);
        assert_eq!(updates[1].name, "group-4-voltage-2");
        assert_eq!(updates[1].value, 1000.0);
        assert_eq!(updates[1].unit, "mV");
    }

    #[test]
    fn test_decode_datagram_reports_parse_errors() {
        let decoder = battery_decoder();
        let err = decoder.decode_datagram(b"garbage").unwrap_err();
        assert!(matches!(err, TelemetryError::Parse(_)));
    }

    #[test]
    fn test_clones_share_the_map() {
        let decoder = battery_decoder();
        let clone = decoder.clone();
        assert!(std::ptr::eq(decoder.signal_map(), clone.signal_map()));
    }
}
