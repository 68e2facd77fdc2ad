//! Event-delivery engine for inwatch
//!
//! This crate holds everything that does not touch the kernel directly:
//! - Event mask bits and the 16-byte inotify record codec
//! - Fixed-capacity event buffer with read/write cursors
//! - Watch registry and its removal lifecycle
//! - Record parser and event classification
//! - The locked pipeline state shared by the reactor and consumers
//! - Watcher configuration
//!
//! The kernel side lives behind the [`EventSource`] trait so the whole engine
//! can be driven from tests with scripted byte streams.

pub mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod mask;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use buffer::EventBuffer;
pub use config::WatcherConfig;
pub use error::{Error, Result};
pub use event::{classify, Classification, Directive, EventKind, WatchEvent};
pub use mask::EventMask;
pub use parser::{parse_next, ParsedEvent};
pub use pipeline::{EventPipeline, FillOutcome, WatcherStats};
pub use record::{RecordHeader, HEADER_SIZE, MAX_NAME_LEN, MAX_RECORD_SIZE};
pub use registry::{Registry, WatchEntry};
pub use source::EventSource;
