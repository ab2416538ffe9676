//! Text wire format for CAN frames
//!
//! Each UDP datagram carries one frame as ASCII text:
//!
//! ```text
//! <frame_id_hex>[:# ]<data_hex>      e.g. 12905301:0150014E0152
//! ```
//!
//! The frame ID is 1-8 hex digits, the data an even-length hex string. The
//! pattern may appear anywhere in the datagram; surrounding text is ignored.

use crate::types::{ParseError, RawFrame};
use regex::Regex;
use std::sync::LazyLock;

static FRAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9A-Fa-f]{1,8})[:# ]([0-9A-Fa-f]+)").expect("frame pattern is valid")
});

/// Stateless parser for the text wire format
pub struct FrameParser;

impl FrameParser {
    /// Parse a raw datagram into a frame
    pub fn parse(datagram: &[u8]) -> Result<RawFrame, ParseError> {
        let text = std::str::from_utf8(datagram).map_err(|_| ParseError::InvalidUtf8)?;
        Self::parse_str(text)
    }

    /// Parse datagram text into a frame
    pub fn parse_str(text: &str) -> Result<RawFrame, ParseError> {
        let text = text.trim();
        let captures = FRAME_PATTERN
            .captures(text)
            .ok_or_else(|| ParseError::NoFrame(text.to_string()))?;

        // Both groups are mandatory in the pattern
        let id_hex = &captures[1];
        let data_hex = &captures[2];

        let frame_id = u32::from_str_radix(id_hex, 16)
            .map_err(|e| ParseError::InvalidFrameId(format!("{}: {}", id_hex, e)))?;
        let payload = hex::decode(data_hex)
            .map_err(|e| ParseError::InvalidHex(format!("{}: {}", data_hex, e)))?;

        Ok(RawFrame { frame_id, payload })
    }
}

/// Build the wire text for a frame: uppercase hex, `:` separator
pub fn encode_frame(frame_id: u32, payload: &[u8]) -> String {
    format!("{:X}:{}", frame_id, hex::encode_upper(payload))
}
