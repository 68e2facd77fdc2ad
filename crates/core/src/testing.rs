//! Scripted kernel stand-in for the engine's unit tests

use crate::source::EventSource;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Hands out descriptors per path and replays queued reads one chunk at a time
#[derive(Default)]
pub(crate) struct ScriptedSource {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_wd: u32,
    by_path: HashMap<PathBuf, u32>,
    masks: HashMap<u32, u32>,
    removed: Vec<u32>,
    reads: VecDeque<Vec<u8>>,
    fail_add: bool,
    fail_read: Option<io::ErrorKind>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make the next `add_watch` fail with ENOSPC
    pub(crate) fn fail_next_add(&self) {
        self.inner.lock().unwrap().fail_add = true;
    }

    /// Make the next `read_events` fail with `kind`
    pub(crate) fn fail_next_read(&self, kind: io::ErrorKind) {
        self.inner.lock().unwrap().fail_read = Some(kind);
    }

    /// Descriptors passed to `rm_watch`, in call order
    pub(crate) fn removed(&self) -> Vec<u32> {
        self.inner.lock().unwrap().removed.clone()
    }

    /// Accumulated mask the "kernel" holds for a descriptor
    pub(crate) fn kernel_mask(&self, wd: u32) -> Option<u32> {
        self.inner.lock().unwrap().masks.get(&wd).copied()
    }

    /// Queue bytes for one future `read_events` call
    pub(crate) fn push_read(&self, bytes: Vec<u8>) {
        self.inner.lock().unwrap().reads.push_back(bytes);
    }
}

impl EventSource for ScriptedSource {
    fn add_watch(&self, path: &Path, mask: u32) -> io::Result<u32> {
        let mut inner = self.inner.lock().unwrap();
        if std::mem::take(&mut inner.fail_add) {
            return Err(io::Error::from_raw_os_error(28));
        }

        let wd = match inner.by_path.get(path) {
            Some(&wd) => wd,
            None => {
                inner.next_wd += 1;
                let wd = inner.next_wd;
                inner.by_path.insert(path.to_path_buf(), wd);
                wd
            }
        };
        *inner.masks.entry(wd).or_insert(0) |= mask;
        Ok(wd)
    }

    fn rm_watch(&self, wd: u32) -> io::Result<()> {
        self.inner.lock().unwrap().removed.push(wd);
        Ok(())
    }

    fn read_events(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(kind) = inner.fail_read.take() {
            return Err(kind.into());
        }

        let next_len = match inner.reads.front() {
            Some(next) => next.len(),
            None => return Err(io::ErrorKind::WouldBlock.into()),
        };

        // The kernel refuses reads that cannot hold the next record
        if next_len > buf.len() {
            return Err(io::ErrorKind::InvalidInput.into());
        }

        let next = inner.reads.pop_front().unwrap_or_default();
        buf[..next.len()].copy_from_slice(&next);
        Ok(next.len())
    }
}
