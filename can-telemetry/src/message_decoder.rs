//! Frame Decoding Engine
//!
//! Extracts signal values from raw frames based on the signal map. Handles
//! byte-range validation, little-endian extraction, scaling and the
//! `group-<pack_id>-<name>` naming scheme.

use crate::signals::database::{FrameDefinition, SignalDefinition};
use crate::types::{RawFrame, SignalUpdate, Timestamp};
use byteorder::{ByteOrder, LittleEndian};

/// Widest field that fits the u64 accumulator
const MAX_FIELD_BYTES: usize = 8;

/// Frame decoder - extracts signal updates from a frame
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode a frame into one update per eligible signal
    ///
    /// A signal whose byte range does not fit the payload is skipped with a
    /// warning; the remaining signals of the frame are still decoded.
    pub fn decode_frame(
        frame: &RawFrame,
        frame_def: &FrameDefinition,
        timestamp: Timestamp,
    ) -> Vec<SignalUpdate> {
        let Some(pack_id) = frame.pack_id() else {
            log::warn!(
                "Frame 0x{:X} has an empty payload, no group ID to decode against",
                frame.frame_id
            );
            return Vec::new();
        };

        frame_def
            .reportable_signals()
            .filter_map(|signal| Self::decode_signal(&frame.payload, signal, pack_id, timestamp))
            .collect()
    }

    /// Decode a single signal from frame data
    fn decode_signal(
        data: &[u8],
        signal: &SignalDefinition,
        pack_id: u8,
        timestamp: Timestamp,
    ) -> Option<SignalUpdate> {
        let raw_value = Self::extract_signal_value(data, signal)?;
        let value = raw_value as f64 * signal.scale;

        Some(SignalUpdate {
            name: Self::published_name(pack_id, signal),
            value,
            unit: signal.unit.clone(),
            timestamp,
        })
    }

    /// Name under which a signal is published for a given group
    pub fn published_name(pack_id: u8, signal: &SignalDefinition) -> String {
        format!("group-{}-{}", pack_id, signal.display_name())
    }

    /// Extract the raw unsigned little-endian value of a signal
    fn extract_signal_value(data: &[u8], signal: &SignalDefinition) -> Option<u64> {
        if signal.end() > data.len() {
            log::warn!(
                "Signal '{}' requires {} bytes but frame only has {} bytes",
                signal.name,
                signal.end(),
                data.len()
            );
            return None;
        }

        match signal.length {
            0 => Some(0),
            n if n > MAX_FIELD_BYTES => {
                log::warn!(
                    "Signal '{}' is {} bytes wide, at most {} are supported",
                    signal.name,
                    n,
                    MAX_FIELD_BYTES
                );
                None
            }
            n => Some(LittleEndian::read_uint(&data[signal.start..], n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_def(signals: Vec<SignalDefinition>) -> FrameDefinition {
        FrameDefinition::new(0x12905301, signals)
    }

    #[test]
    fn test_decode_cell_voltage() {
        let frame = RawFrame::new(0x12905301, vec![0x01, 0x2C, 0x01, 0x2C, 0x01]);
        let def = frame_def(vec![SignalDefinition::new("cell_1", 1, 2)]);

        let updates = MessageDecoder::decode_frame(&frame, &def, 1.0);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].name, "group-1-voltage-1");
        assert_eq!(updates[0].value, 300.0);
        assert_eq!(updates[0].timestamp, 1.0);
    }

    #[test]
    fn test_decode_applies_scale_and_unit() {
        let frame = RawFrame::new(0x12905601, vec![0x03, 0xFA, 0x00]);
        let def = frame_def(vec![SignalDefinition::new("temp_2", 1, 2)
            .with_scale(0.1)
            .with_unit("°C")]);

        let updates = MessageDecoder::decode_frame(&frame, &def, 0.0);
        assert_eq!(updates[0].name, "group-3-temp-2");
        assert!((updates[0].value - 25.0).abs() < 1e-9);
        assert_eq!(updates[0].unit, "°C");
    }

    #[test]
    fn test_pack_id_definition_is_not_reported() {
        let frame = RawFrame::new(0x12905301, vec![0x07, 0x10, 0x00]);
        let def = frame_def(vec![
            SignalDefinition::new("pack_id", 0, 1),
            SignalDefinition::new("cell_1", 1, 2),
        ]);

        let updates = MessageDecoder::decode_frame(&frame, &def, 0.0);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].name, "group-7-voltage-1");
        assert_eq!(updates[0].value, 16.0);
    }

    #[test]
    fn test_truncated_signal_skipped_others_kept() {
        let frame = RawFrame::new(0x12905301, vec![0x02, 0x01, 0x00, 0x02, 0x00]);
        let def = frame_def(vec![
            SignalDefinition::new("cell_1", 1, 2),
            SignalDefinition::new("cell_2", 3, 2),
            SignalDefinition::new("cell_3", 5, 2),
            SignalDefinition::new("status", 4, 1),
        ]);

        let updates = MessageDecoder::decode_frame(&frame, &def, 0.0);
        let names: Vec<&str> = updates.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["group-2-voltage-1", "group-2-voltage-2", "group-2-status"]);
        assert_eq!(updates[1].value, 2.0);
    }

    #[test]
    fn test_signal_ending_exactly_at_payload_end() {
        let frame = RawFrame::new(0x1, vec![0x00, 0x34, 0x12]);
        let def = frame_def(vec![SignalDefinition::new("word", 1, 2)]);
        let updates = MessageDecoder::decode_frame(&frame, &def, 0.0);
        assert_eq!(updates[0].value, f64::from(0x1234u16));
    }

    #[test]
    fn test_empty_payload_yields_nothing() {
        let frame = RawFrame::new(0x1, Vec::new());
        let def = frame_def(vec![SignalDefinition::new("cell_1", 0, 0)]);
        assert!(MessageDecoder::decode_frame(&frame, &def, 0.0).is_empty());
    }

    #[test]
    fn test_zero_and_oversized_lengths() {
        let frame = RawFrame::new(0x1, vec![0x05; 12]);
        let def = frame_def(vec![
            SignalDefinition::new("flag", 1, 0),
            SignalDefinition::new("wide", 1, 9),
            SignalDefinition::new("odometer", 1, 8),
        ]);

        let updates = MessageDecoder::decode_frame(&frame, &def, 0.0);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].name, "group-5-flag");
        assert_eq!(updates[0].value, 0.0);
        assert_eq!(updates[1].name, "group-5-odometer");
        assert_eq!(updates[1].value, 0x0505_0505_0505_0505u64 as f64);
    }

    #[test]
    fn test_definition_covering_group_byte_is_decoded() {
        let frame = RawFrame::new(0x1, vec![0x09, 0x00]);
        let def = frame_def(vec![SignalDefinition::new("board", 0, 1)]);
        let updates = MessageDecoder::decode_frame(&frame, &def, 0.0);
        assert_eq!(updates[0].name, "group-9-board");
        assert_eq!(updates[0].value, 9.0);
    }
}
