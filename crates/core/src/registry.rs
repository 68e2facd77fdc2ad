//! Watch registry: watch descriptor -> watched path

use crate::error::{Error, Result};
use crate::event::Directive;
use crate::mask::EventMask;
use crate::source::EventSource;
use ahash::AHashMap;
use std::ffi::OsString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// One watched path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
    /// Absolute path; directories carry a trailing separator so child names
    /// can be appended directly
    pub path: PathBuf,
    pub is_dir: bool,
    /// Kernel-assigned watch descriptor
    pub wd: u32,
    /// Union of every interest mask requested for this path
    pub flags: EventMask,
    /// Self-delete/self-move seen or removal requested; waiting for `IN_IGNORED`
    pub pending_removal: bool,
    /// Mask of the most recent record for this watch
    pub last_mask: EventMask,
    /// File name derived from the most recent record
    pub last_file_name: PathBuf,
}

impl WatchEntry {
    /// File name for a record carrying `name` (already stripped of padding)
    pub fn file_name_for(&self, name: &[u8]) -> PathBuf {
        if name.is_empty() {
            return self.path.clone();
        }

        let mut joined = OsString::with_capacity(self.path.as_os_str().len() + name.len());
        joined.push(self.path.as_os_str());
        joined.push(std::ffi::OsStr::from_bytes(name));
        PathBuf::from(joined)
    }
}

/// Mapping from watch descriptor to entry
///
/// A descriptor stays here until the kernel's terminal `IN_IGNORED` record
/// for it has been parsed, and then only if the entry was pending removal.
#[derive(Debug, Default)]
pub struct Registry {
    entries: AHashMap<u32, WatchEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch `path` through `source`, creating an entry or merging `flags`
    /// into the existing one for the returned descriptor
    ///
    /// The kernel always gets `flags | DONT_FOLLOW | MASK_ADD`. Nothing in the
    /// registry changes unless the kernel accepted the watch.
    pub fn register(
        &mut self,
        source: &dyn EventSource,
        path: &Path,
        flags: EventMask,
    ) -> Result<&WatchEntry> {
        let absolute = absolute_lexical(path).map_err(|e| Error::Register {
            path: path.to_path_buf(),
            source: e,
        })?;

        let metadata = match std::fs::symlink_metadata(&absolute) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::PathNotFound(absolute));
            }
            Err(e) => {
                return Err(Error::Register {
                    path: absolute,
                    source: e,
                })
            }
        };

        let mask = (flags | EventMask::REGISTER_FLAGS).bits();
        let wd = source
            .add_watch(&absolute, mask)
            .map_err(|e| Error::Register {
                path: absolute.clone(),
                source: e,
            })?;

        let entry = self.entries.entry(wd).or_insert_with(|| {
            let is_dir = metadata.is_dir();
            debug!("New watch {} on {}", wd, absolute.display());
            WatchEntry {
                path: entry_path(absolute, is_dir),
                is_dir,
                wd,
                flags: EventMask::empty(),
                pending_removal: false,
                last_mask: EventMask::empty(),
                last_file_name: PathBuf::new(),
            }
        });
        entry.flags |= flags;

        Ok(entry)
    }

    /// Look up an entry by descriptor
    pub fn resolve(&self, wd: u32) -> Option<&WatchEntry> {
        self.entries.get(&wd)
    }

    pub fn resolve_mut(&mut self, wd: u32) -> Option<&mut WatchEntry> {
        self.entries.get_mut(&wd)
    }

    /// Find the live entry for a path, ignoring any trailing separator
    pub fn find_by_path(&self, path: &Path) -> Option<&WatchEntry> {
        let absolute = absolute_lexical(path).ok()?;
        self.entries.values().find(|entry| entry.path == absolute)
    }

    /// Flag an entry as going away; unknown descriptors are ignored
    pub fn mark_pending_removal(&mut self, wd: u32) {
        if let Some(entry) = self.entries.get_mut(&wd) {
            entry.pending_removal = true;
        }
    }

    /// Remove an entry if it is pending removal and report whether it was removed
    pub fn finalize(&mut self, wd: u32) -> bool {
        match self.entries.get(&wd) {
            Some(entry) if entry.pending_removal => {
                self.entries.remove(&wd);
                true
            }
            _ => false,
        }
    }

    /// Explicitly drop the kernel watch for `path` and mark its entry pending removal
    pub fn deregister(&mut self, source: &dyn EventSource, path: &Path) -> Result<u32> {
        let entry = self
            .find_by_path(path)
            .ok_or_else(|| Error::NotWatched(path.to_path_buf()))?;
        let wd = entry.wd;

        if !entry.pending_removal {
            source.rm_watch(wd).map_err(|e| Error::Register {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        self.mark_pending_removal(wd);
        Ok(wd)
    }

    /// Carry out the registry change a classified event asked for
    ///
    /// `source` is `None` once the watcher has released its handles; kernel
    /// deregistration is skipped then since the watches are already gone.
    pub fn apply(&mut self, wd: u32, directive: Directive, source: Option<&dyn EventSource>) {
        match directive {
            Directive::MarkPendingRemoval => self.mark_pending_removal(wd),
            Directive::Deregister => {
                let already_pending = self
                    .entries
                    .get(&wd)
                    .map(|entry| entry.pending_removal)
                    .unwrap_or(true);
                self.mark_pending_removal(wd);

                if let (false, Some(source)) = (already_pending, source) {
                    if let Err(e) = source.rm_watch(wd) {
                        warn!("Failed to drop watch {} after self-move: {}", wd, e);
                    }
                }
            }
            Directive::Finalize => {
                if self.finalize(wd) {
                    debug!("Watch {} finalized and removed", wd);
                } else {
                    debug!("Watch {} ignored by kernel but was not pending removal", wd);
                }
            }
        }
    }

    /// Number of tracked descriptors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All tracked entries, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &WatchEntry> {
        self.entries.values()
    }
}

/// Absolute form of `path` with `.` and `..` resolved lexically
///
/// Symlinks are not consulted, so `link/..` is the directory holding `link`.
fn absolute_lexical(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `pop` refuses to go above the root
                cleaned.pop();
            }
            other => cleaned.push(other),
        }
    }
    Ok(cleaned)
}

fn entry_path(absolute: PathBuf, is_dir: bool) -> PathBuf {
    if !is_dir || absolute.as_os_str().as_bytes().last() == Some(&b'/') {
        return absolute;
    }

    let mut with_separator = absolute.into_os_string();
    with_separator.push("/");
    PathBuf::from(with_separator)
}
