//! Signal map and its JSON parser
//!
//! This module contains the parser for the signal map file and the
//! in-memory map the decoder reads from.

pub mod database;
pub mod json;

// Re-export key types for convenience
pub use database::{FrameDefinition, MapStats, SignalDefinition, SignalMap, PACK_ID_SIGNAL};

use crate::types::Result;
use std::path::Path;

impl SignalMap {
    /// Load a signal map file, failing on a missing or malformed file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        json::parse_map_file(path)
    }

    /// Parse signal map JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        json::parse_map_str(content)
    }

    /// Load a signal map file, substituting an empty map on any error
    ///
    /// The pipeline keeps receiving with an empty map; it just decodes nothing.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::from_json_file(path) {
            Ok(map) => map,
            Err(e) => {
                log::error!("{}; continuing with an empty signal map", e);
                Self::new()
            }
        }
    }
}
