//! Event printing: colored text lines or JSON lines

use anyhow::Result;
use inwatch_watcher::{EventKind, WatchEvent};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::{IsTerminal, Write};

/// One event as printed by `--json`
#[derive(Debug, Serialize)]
pub struct EventRecord {
    pub event: &'static str,
    pub path: String,
    pub mask: u32,
    pub cookie: u32,
    pub wd: u32,
    pub is_dir: bool,
}

impl From<&WatchEvent> for EventRecord {
    fn from(event: &WatchEvent) -> Self {
        Self {
            event: event.event_name(),
            path: event.path().to_string_lossy().into_owned(),
            mask: event.mask.bits(),
            cookie: event.cookie,
            wd: event.wd,
            is_dir: event.is_dir(),
        }
    }
}

pub struct Printer {
    json: bool,
    color: bool,
}

impl Printer {
    /// Colors are used only for text output to a terminal
    pub fn new(json: bool) -> Self {
        Self {
            json,
            color: !json && std::io::stdout().is_terminal(),
        }
    }

    pub fn print(&self, event: &WatchEvent) -> Result<()> {
        let line = if self.json {
            serde_json::to_string(&EventRecord::from(event))?
        } else {
            format_event(event, self.color)
        };

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
        Ok(())
    }
}

/// `LABEL path`, label padded so paths line up
pub fn format_event(event: &WatchEvent, color: bool) -> String {
    let label = format!("{:<13}", event.event_name());
    let path = event.path().display();

    if !color {
        return format!("{} {}", label, path);
    }

    let label = match event.kind() {
        EventKind::Create => label.green().to_string(),
        EventKind::Delete | EventKind::DeleteSelf => label.red().to_string(),
        EventKind::Modify | EventKind::CloseWrite => label.yellow().to_string(),
        EventKind::Move | EventKind::MovedFrom | EventKind::MovedTo | EventKind::MoveSelf => {
            label.blue().to_string()
        }
        EventKind::Overflow => label.magenta().bold().to_string(),
        EventKind::Removed | EventKind::Unknown => label.dimmed().to_string(),
        _ => label,
    };
    format!("{} {}", label, path)
}
