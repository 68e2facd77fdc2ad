//! Binary inotify record codec
//!
//! Layout of one record as the kernel writes it (`struct inotify_event`):
//! ```text
//! offset  size  field
//!      0     4  wd      watch descriptor
//!      4     4  mask    event bits
//!      8     4  cookie  correlates MOVED_FROM / MOVED_TO pairs
//!     12     4  len     length of the name that follows, padding included
//!     16   len  name    NUL-terminated, NUL-padded child name
//! ```
//! All fields are native-endian. Decoding pulls each field out explicitly
//! rather than casting the buffer to a struct.

use crate::mask::EventMask;

/// Size of the fixed record header
pub const HEADER_SIZE: usize = 16;

/// Longest file name the kernel reports (`NAME_MAX`) plus its terminator
pub const MAX_NAME_LEN: usize = 256;

/// Largest record the kernel can produce
pub const MAX_RECORD_SIZE: usize = HEADER_SIZE + MAX_NAME_LEN;

/// Watch descriptor the kernel uses for queue-level records (`IN_Q_OVERFLOW`)
pub const QUEUE_WD: u32 = u32::MAX;

/// Decoded fixed part of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Watch descriptor the record belongs to
    pub wd: u32,
    /// Raw event bits
    pub mask: u32,
    /// Move correlation cookie
    pub cookie: u32,
    /// Number of name bytes following the header
    pub len: u32,
}

impl RecordHeader {
    /// Decode a header from the front of `bytes`
    ///
    /// Returns `None` when fewer than [`HEADER_SIZE`] bytes are available.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }

        Some(Self {
            wd: read_u32(bytes, 0),
            mask: read_u32(bytes, 4),
            cookie: read_u32(bytes, 8),
            len: read_u32(bytes, 12),
        })
    }

    /// Event bits as flags, unknown bits retained
    pub fn event_mask(&self) -> EventMask {
        EventMask::from_bits_retain(self.mask)
    }

    /// Total bytes this record occupies: header plus name
    pub fn record_len(&self) -> usize {
        HEADER_SIZE + self.len as usize
    }

    /// True for records the kernel emits about its own queue rather than a watch
    pub fn is_queue_overflow(&self) -> bool {
        self.wd == QUEUE_WD && self.event_mask().contains(EventMask::Q_OVERFLOW)
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut field = [0u8; 4];
    field.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(field)
}

/// Strip the NUL terminator and padding from a record's name field
pub fn trim_name(raw: &[u8]) -> &[u8] {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    &raw[..end]
}

/// Encode one record the way the kernel lays it out
///
/// The name is NUL-terminated and padded to a multiple of the header size,
/// matching what `read(2)` on an inotify descriptor returns. Used by scripted
/// event sources and benchmarks.
pub fn encode_record(wd: u32, mask: u32, cookie: u32, name: &[u8]) -> Vec<u8> {
    let padded = if name.is_empty() {
        0
    } else {
        (name.len() + 1).div_ceil(HEADER_SIZE) * HEADER_SIZE
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + padded);
    out.extend_from_slice(&wd.to_ne_bytes());
    out.extend_from_slice(&mask.to_ne_bytes());
    out.extend_from_slice(&cookie.to_ne_bytes());
    out.extend_from_slice(&(padded as u32).to_ne_bytes());
    out.extend_from_slice(name);
    out.resize(HEADER_SIZE + padded, 0);
    out
}
