//! Argument helpers

use anyhow::{Context, Result};
use inwatch_watcher::{EventMask, WatcherConfig};
use std::path::Path;

/// Combine event kind names into one interest mask
///
/// An empty list means every interest kind.
pub fn parse_event_flags(names: &[String]) -> Result<EventMask> {
    if names.is_empty() {
        return Ok(EventMask::INTEREST);
    }

    let mut flags = EventMask::empty();
    for name in names {
        let kind = EventMask::from_interest_name(name)
            .with_context(|| format!("Unknown event kind: '{}'", name))?;
        flags |= kind;
    }
    Ok(flags)
}

/// Load the config file if one was given, defaults otherwise
pub fn load_config(path: Option<&Path>) -> Result<WatcherConfig> {
    match path {
        Some(path) => WatcherConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(WatcherConfig::default()),
    }
}
