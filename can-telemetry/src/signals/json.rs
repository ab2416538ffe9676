//! JSON signal map parser
//!
//! The signal map file is a JSON object keyed by frame ID in hex (no `0x`
//! prefix required):
//!
//! ```json
//! {
//!   "12905301": {
//!     "signals": [
//!       {"name": "pack_id", "start": 0, "length": 1},
//!       {"name": "cell_1", "start": 1, "length": 2, "scale": 1.0, "unit": "mV"}
//!     ]
//!   }
//! }
//! ```

use crate::signals::database::{FrameDefinition, SignalDefinition, SignalMap};
use crate::types::{Result, TelemetryError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One entry of the signal map file
#[derive(Debug, Deserialize)]
struct FrameEntry {
    #[serde(default)]
    signals: Vec<SignalDefinition>,
}

/// Parse a signal map file
pub fn parse_map_file(path: &Path) -> Result<SignalMap> {
    log::info!("Parsing signal map: {:?}", path);

    let content = std::fs::read_to_string(path).map_err(|e| {
        TelemetryError::Config(format!("Failed to read file {:?}: {}", path, e))
    })?;

    let map = parse_map_str(&content)
        .map_err(|e| TelemetryError::Config(format!("{:?}: {}", path, e)))?;

    let stats = map.stats();
    log::info!(
        "Parsed {} frames ({} signals) from {:?}",
        stats.num_frames,
        stats.num_signals,
        path
    );

    Ok(map)
}

/// Parse signal map JSON text
///
/// Two keys that name the same frame ID (`"12905301"` and `"0x12905301"`)
/// are a configuration error.
pub fn parse_map_str(content: &str) -> Result<SignalMap> {
    let entries: HashMap<String, FrameEntry> = serde_json::from_str(content)
        .map_err(|e| TelemetryError::Config(format!("Invalid JSON: {}", e)))?;

    let mut map = SignalMap::new();
    for (key, entry) in entries {
        let id = parse_frame_id(&key)?;
        if map.get_frame(id).is_some() {
            return Err(TelemetryError::Config(format!(
                "Frame 0x{:X} is defined by more than one key (last seen as {:?})",
                id, key
            )));
        }
        map.add_frame(FrameDefinition::new(id, entry.signals));
    }

    Ok(map)
}

/// Convert a hex frame ID key (optionally `0x`-prefixed) to an integer
fn parse_frame_id(key: &str) -> Result<u32> {
    let trimmed = key.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    u32::from_str_radix(digits, 16)
        .map_err(|e| TelemetryError::Config(format!("Invalid frame ID key {:?}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MAP_JSON: &str = r#"
{
  "12905301": {
    "signals": [
      {"name": "pack_id", "start": 0, "length": 1},
      {"name": "cell_1", "start": 1, "length": 2, "scale": 1, "unit": "mV"},
      {"name": "cell_2", "start": 3, "length": 2, "scale": 1, "unit": "mV"}
    ]
  },
  "0x12905601": {
    "signals": [
      {"name": "temp_1", "start": 1, "length": 2, "scale": 0.1, "unit": "°C"}
    ]
  }
}
"#;

    #[test]
    fn test_parse_simple_map() {
        let map = parse_map_str(MAP_JSON).unwrap();
        assert_eq!(map.frame_ids(), vec![0x12905301, 0x12905601]);

        let cells = map.get_frame(0x12905301).unwrap();
        assert_eq!(cells.signals.len(), 3);
        assert_eq!(cells.signals[1].name, "cell_1");
        assert_eq!(cells.signals[1].start, 1);
        assert_eq!(cells.signals[1].length, 2);
        assert_eq!(cells.signals[1].unit, "mV");

        let temps = map.get_frame(0x12905601).unwrap();
        assert_eq!(temps.signals[0].scale, 0.1);
    }

    #[test]
    fn test_parse_map_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MAP_JSON.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let map = parse_map_file(temp_file.path()).unwrap();
        assert_eq!(map.stats().num_frames, 2);
        assert_eq!(map.stats().num_signals, 4);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = parse_map_str("{ not json").unwrap_err();
        assert!(matches!(err, TelemetryError::Config(_)));
    }

    #[test]
    fn test_invalid_key_is_config_error() {
        let err = parse_map_str(r#"{"ZZZ": {"signals": []}}"#).unwrap_err();
        assert!(matches!(err, TelemetryError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = parse_map_file(Path::new("/nonexistent/can_map.json")).unwrap_err();
        assert!(matches!(err, TelemetryError::Config(_)));
    }

    #[test]
    fn test_same_frame_under_two_spellings_is_rejected() {
        let json = r#"{
            "12905301": {"signals": [{"name": "cell_1", "start": 1, "length": 2}]},
            "0x12905301": {"signals": [{"name": "cell_2", "start": 3, "length": 2}]}
        }"#;
        let err = parse_map_str(json).unwrap_err();
        assert!(matches!(err, TelemetryError::Config(ref msg) if msg.contains("0x12905301")));
    }

    #[test]
    fn test_frame_without_signals_key() {
        let map = parse_map_str(r#"{"7FF": {}}"#).unwrap();
        assert!(map.get_frame(0x7FF).unwrap().signals.is_empty());
    }
}
