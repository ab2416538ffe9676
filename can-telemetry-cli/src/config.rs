//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_telemetry::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from telemetry.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub signals: SignalsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalsConfig {
    #[serde(default = "default_map_file")]
    pub map_file: PathBuf,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            map_file: default_map_file(),
        }
    }
}

fn default_map_file() -> PathBuf {
    PathBuf::from("can_map.json")
}

/// Console viewer settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsoleConfig {
    /// Print every update on stdout
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub format: ConsoleFormat,
    /// Updates buffered for the console before it starts missing some
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: ConsoleFormat::default(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    4096
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// One JSON object per line, as sent to dashboard clients
    #[default]
    Json,
    /// `name = value unit`
    Text,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
