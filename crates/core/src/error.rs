//! Error types shared by the engine and the Linux watcher

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Everything a watcher operation can fail with
#[derive(Debug, Error)]
pub enum Error {
    /// An OS handle could not be created or wired up during construction
    #[error("failed to set up {what}: {source}")]
    Setup {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// The path handed to `add_watch` does not exist
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// The kernel rejected the watch
    #[error("failed to watch {}: {source}", path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `remove_watch` was called for a path with no live entry
    #[error("path is not watched: {}", .0.display())]
    NotWatched(PathBuf),

    /// The watcher was closed, explicitly or after a fatal reactor error
    #[error("watcher is closed")]
    Closed,

    /// Fewer bytes than one record header were buffered when an event was expected
    #[error("event buffer underrun: {available} bytes buffered, a record header needs 16")]
    BufferUnderrun { available: usize },

    /// A record referenced a watch descriptor the registry does not track
    #[error("event buffer inconsistency: no watch registered for descriptor {wd}")]
    Inconsistent { wd: u32 },

    /// Invalid or unreadable configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// True for errors after which no further events will ever be delivered
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }
}
