//! inotify event mask bits
//!
//! Bit values are fixed by the Linux ABI (`<sys/inotify.h>`), so they are
//! spelled out here instead of being pulled from libc. That keeps the engine
//! crate free of platform bindings.

use bitflags::bitflags;

bitflags! {
    /// Event and watch flags as carried in an inotify record or passed to
    /// `inotify_add_watch`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct EventMask: u32 {
        /// File was accessed
        const ACCESS = 0x0000_0001;
        /// File was modified
        const MODIFY = 0x0000_0002;
        /// Metadata changed
        const ATTRIB = 0x0000_0004;
        /// Writable file was closed
        const CLOSE_WRITE = 0x0000_0008;
        /// Unwritable file was closed
        const CLOSE_NOWRITE = 0x0000_0010;
        /// File was opened
        const OPEN = 0x0000_0020;
        /// File was moved out of a watched directory
        const MOVED_FROM = 0x0000_0040;
        /// File was moved into a watched directory
        const MOVED_TO = 0x0000_0080;
        /// Child was created
        const CREATE = 0x0000_0100;
        /// Child was deleted
        const DELETE = 0x0000_0200;
        /// Watched path itself was deleted
        const DELETE_SELF = 0x0000_0400;
        /// Watched path itself was moved
        const MOVE_SELF = 0x0000_0800;

        /// Backing filesystem was unmounted
        const UNMOUNT = 0x0000_2000;
        /// Kernel event queue overflowed
        const Q_OVERFLOW = 0x0000_4000;
        /// Watch was removed, explicitly or by the kernel
        const IGNORED = 0x0000_8000;

        /// Only watch the path if it is a directory
        const ONLYDIR = 0x0100_0000;
        /// Do not follow a symlink
        const DONT_FOLLOW = 0x0200_0000;
        /// Exclude events on unlinked children
        const EXCL_UNLINK = 0x0400_0000;
        /// Add to the mask of an existing watch instead of replacing it
        const MASK_ADD = 0x2000_0000;
        /// Subject of the event is a directory
        const ISDIR = 0x4000_0000;
        /// Only send one event, then drop the watch
        const ONESHOT = 0x8000_0000;

        /// Either close
        const CLOSE = Self::CLOSE_WRITE.bits() | Self::CLOSE_NOWRITE.bits();
        /// Either half of a move
        const MOVE = Self::MOVED_FROM.bits() | Self::MOVED_TO.bits();
    }
}

impl EventMask {
    /// Interest kinds a caller may ask for
    pub const INTEREST: EventMask = EventMask::OPEN
        .union(EventMask::ATTRIB)
        .union(EventMask::CLOSE)
        .union(EventMask::CREATE)
        .union(EventMask::DELETE)
        .union(EventMask::DELETE_SELF)
        .union(EventMask::MODIFY)
        .union(EventMask::MOVE)
        .union(EventMask::MOVE_SELF);

    /// Flags added to every registration: never follow symlinks, and merge
    /// with whatever mask the kernel already holds for the inode
    pub const REGISTER_FLAGS: EventMask = EventMask::DONT_FOLLOW.union(EventMask::MASK_ADD);

    /// Parse a single interest kind by name, case-insensitively
    ///
    /// Accepts the kernel names without the `IN_` prefix (`create`,
    /// `close_write`, `move_self`, ...).
    pub fn from_interest_name(name: &str) -> Option<EventMask> {
        let upper = name.trim().to_ascii_uppercase();
        let upper = upper.strip_prefix("IN_").unwrap_or(&upper);
        EventMask::from_name(upper).filter(|mask| EventMask::INTEREST.contains(*mask))
    }

    /// True when every bit of `kind` is set
    ///
    /// Composite kinds such as [`EventMask::CLOSE`] therefore only match when
    /// both halves are present.
    pub fn has_all(self, kind: EventMask) -> bool {
        self.bits() & kind.bits() == kind.bits()
    }
}
