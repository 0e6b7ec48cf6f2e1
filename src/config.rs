//! Configuration for the escrow authority.

use crate::event::DEFAULT_EVENT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Market configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Seconds the consumer has to contest revealed keys.
    #[serde(default = "default_dispute_window")]
    pub dispute_window_secs: u64,

    /// Seconds a filed dispute stays open for proof of misbehavior.
    #[serde(default = "default_pom_window")]
    pub pom_window_secs: u64,

    /// Event broadcast buffer size.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Root directory for authority data.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            dispute_window_secs: default_dispute_window(),
            pom_window_secs: default_pom_window(),
            event_capacity: default_event_capacity(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "p2pcdn")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".p2pcdn"))
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_dispute_window() -> u64 {
    600 // 10 minutes
}

const fn default_pom_window() -> u64 {
    600
}

const fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl MarketConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
