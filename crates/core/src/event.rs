//! Delivered events and their classification

use crate::mask::EventMask;
use std::path::{Path, PathBuf};

/// Named kind of an event, one per record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Watched path itself was deleted
    DeleteSelf,
    /// Watched path itself was moved
    MoveSelf,
    /// Child created
    Create,
    /// Child deleted
    Delete,
    /// Opened
    Open,
    /// Both close bits set
    Close,
    /// Writable file closed
    CloseWrite,
    /// Unwritable file closed
    CloseNoWrite,
    /// Both move bits set
    Move,
    /// Moved out of a watched directory
    MovedFrom,
    /// Moved into a watched directory
    MovedTo,
    /// Content modified
    Modify,
    /// Metadata changed
    Attrib,
    /// Kernel dropped the watch; terminal for its descriptor
    Removed,
    /// Kernel event queue overflowed and events were lost
    Overflow,
    /// None of the recognized bits
    Unknown,
}

impl EventKind {
    /// Label used in output and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DeleteSelf => "DELETE_SELF",
            EventKind::MoveSelf => "MOVE_SELF",
            EventKind::Create => "CREATE",
            EventKind::Delete => "DELETE",
            EventKind::Open => "OPEN",
            EventKind::Close => "CLOSE",
            EventKind::CloseWrite => "CLOSE_WRITE",
            EventKind::CloseNoWrite => "CLOSE_NOWRITE",
            EventKind::Move => "MOVE",
            EventKind::MovedFrom => "MOVED_FROM",
            EventKind::MovedTo => "MOVED_TO",
            EventKind::Modify => "MODIFY",
            EventKind::Attrib => "ATTRIB",
            EventKind::Removed => "REMOVE",
            EventKind::Overflow => "OVERFLOW",
            EventKind::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry change an event calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Entry is going away; keep it until the kernel confirms with `IN_IGNORED`
    MarkPendingRemoval,
    /// As above, and explicitly drop the kernel watch
    Deregister,
    /// Remove the entry if it is pending removal
    Finalize,
}

/// Outcome of classifying a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: EventKind,
    pub directive: Option<Directive>,
}

/// Priority order; the first kind whose bits are all present wins
const PRIORITY: &[(EventMask, EventKind)] = &[
    (EventMask::DELETE_SELF, EventKind::DeleteSelf),
    (EventMask::MOVE_SELF, EventKind::MoveSelf),
    (EventMask::CREATE, EventKind::Create),
    (EventMask::DELETE, EventKind::Delete),
    (EventMask::OPEN, EventKind::Open),
    (EventMask::CLOSE, EventKind::Close),
    (EventMask::CLOSE_WRITE, EventKind::CloseWrite),
    (EventMask::CLOSE_NOWRITE, EventKind::CloseNoWrite),
    (EventMask::MOVE, EventKind::Move),
    (EventMask::MOVED_FROM, EventKind::MovedFrom),
    (EventMask::MOVED_TO, EventKind::MovedTo),
    (EventMask::MODIFY, EventKind::Modify),
    (EventMask::ATTRIB, EventKind::Attrib),
    (EventMask::IGNORED, EventKind::Removed),
    (EventMask::Q_OVERFLOW, EventKind::Overflow),
];

/// Classify a record mask into exactly one kind plus the registry directive it implies
///
/// Several bits can arrive in one record (`IN_IGNORED` follows `IN_DELETE_SELF`
/// in the same read, `IN_ISDIR` rides along with child events), so the order
/// of the checks decides the label.
pub fn classify(mask: EventMask) -> Classification {
    let kind = PRIORITY
        .iter()
        .find(|(bits, _)| mask.has_all(*bits))
        .map(|(_, kind)| *kind)
        .unwrap_or(EventKind::Unknown);

    let directive = match kind {
        EventKind::DeleteSelf => Some(Directive::MarkPendingRemoval),
        EventKind::MoveSelf => Some(Directive::Deregister),
        EventKind::Removed => Some(Directive::Finalize),
        _ => None,
    };

    Classification { kind, directive }
}

/// One filesystem change as handed to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Watched path, with the child name appended for events inside a directory
    pub file_name: PathBuf,
    /// Raw event mask from the record
    pub mask: EventMask,
    /// Move correlation cookie, zero when unused
    pub cookie: u32,
    /// Watch descriptor the record came from
    pub wd: u32,
}

impl WatchEvent {
    /// Classification label for this event
    pub fn event_name(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn kind(&self) -> EventKind {
        classify(self.mask).kind
    }

    /// True when the kernel flagged the subject as a directory
    pub fn is_dir(&self) -> bool {
        self.mask.contains(EventMask::ISDIR)
    }

    pub fn path(&self) -> &Path {
        &self.file_name
    }
}
