//! Record parser: front of the event buffer -> one event

use crate::buffer::EventBuffer;
use crate::error::{Error, Result};
use crate::event::WatchEvent;
use crate::record::{trim_name, RecordHeader, HEADER_SIZE};
use crate::registry::Registry;
use std::path::PathBuf;
use tracing::{debug, warn};

/// An event together with the descriptor it resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub wd: u32,
    pub event: WatchEvent,
}

/// Decode and consume the record at the front of `buffer`
///
/// Returns `Ok(None)` when the buffer does not yet hold a complete record.
/// When the record names a descriptor the registry no longer tracks, the
/// whole buffer is discarded and [`Error::Inconsistent`] is returned: the
/// remaining bytes can no longer be trusted to line up with live watches.
pub fn parse_next(buffer: &mut EventBuffer, registry: &mut Registry) -> Result<Option<ParsedEvent>> {
    let Some(header) = RecordHeader::decode(buffer.as_slice()) else {
        return Ok(None);
    };

    let record_len = header.record_len();
    if buffer.len() < record_len {
        return Ok(None);
    }

    if header.is_queue_overflow() {
        warn!("Kernel event queue overflowed, events were dropped");
        buffer.consume(record_len);
        return Ok(Some(ParsedEvent {
            wd: header.wd,
            event: WatchEvent {
                file_name: PathBuf::new(),
                mask: header.event_mask(),
                cookie: header.cookie,
                wd: header.wd,
            },
        }));
    }

    let Some(entry) = registry.resolve_mut(header.wd) else {
        warn!(
            "Record for unknown watch {} (mask {:#x}), discarding {} buffered bytes",
            header.wd,
            header.mask,
            buffer.len()
        );
        buffer.clear();
        return Err(Error::Inconsistent { wd: header.wd });
    };

    let name = trim_name(&buffer.as_slice()[HEADER_SIZE..record_len]);
    let file_name = entry.file_name_for(name);

    entry.last_mask = header.event_mask();
    entry.last_file_name = file_name.clone();

    buffer.consume(record_len);
    debug!("Parsed {:#x} for {}", header.mask, file_name.display());

    Ok(Some(ParsedEvent {
        wd: header.wd,
        event: WatchEvent {
            file_name,
            mask: header.event_mask(),
            cookie: header.cookie,
            wd: header.wd,
        },
    }))
}
