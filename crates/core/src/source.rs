//! Kernel event source abstraction

use std::io;
use std::path::Path;

/// The subscription side of the kernel: registers paths and hands out raw records
///
/// On Linux this is an inotify descriptor. Tests drive the engine with a
/// scripted implementation instead.
pub trait EventSource: Send + Sync {
    /// Watch `path` with the raw `mask` and return the kernel-assigned descriptor
    fn add_watch(&self, path: &Path, mask: u32) -> io::Result<u32>;

    /// Ask the kernel to drop a watch; it answers with an `IN_IGNORED` record
    fn rm_watch(&self, wd: u32) -> io::Result<()>;

    /// Read whatever records are ready into `buf` and return the byte count
    ///
    /// Must never split a record. Returns `WouldBlock` when nothing is
    /// pending and `InvalidInput` when `buf` cannot hold the next record.
    fn read_events(&self, buf: &mut [u8]) -> io::Result<usize>;
}
