//! Watcher configuration
//!
//! Loaded from TOML; every key is optional:
//! ```toml
//! buffer_records = 32
//! high_water_percent = 80
//! max_ready_events = 10
//! ```

use crate::error::{Error, Result};
use crate::record::MAX_RECORD_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for the event buffer and the reactor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatcherConfig {
    /// Buffer capacity, counted in maximum-sized records
    pub buffer_records: usize,

    /// Buffered fill level, as a percentage of capacity, above which the
    /// reactor parses a record out before reading more
    pub high_water_percent: u8,

    /// Readiness events fetched per multiplexer wait
    pub max_ready_events: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            buffer_records: 32,
            high_water_percent: 80,
            max_ready_events: 10,
        }
    }
}

impl WatcherConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: WatcherConfig =
            toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value against its allowed range
    pub fn validate(&self) -> Result<()> {
        if !(1..=4096).contains(&self.buffer_records) {
            return Err(Error::Config(format!(
                "buffer_records must be between 1 and 4096, got {}",
                self.buffer_records
            )));
        }

        if !(10..=95).contains(&self.high_water_percent) {
            return Err(Error::Config(format!(
                "high_water_percent must be between 10 and 95, got {}",
                self.high_water_percent
            )));
        }

        if !(1..=1024).contains(&self.max_ready_events) {
            return Err(Error::Config(format!(
                "max_ready_events must be between 1 and 1024, got {}",
                self.max_ready_events
            )));
        }

        Ok(())
    }

    /// Buffer capacity in bytes
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_records * MAX_RECORD_SIZE
    }
}
