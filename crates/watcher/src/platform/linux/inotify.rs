//! inotify instance used as the engine's event source

use inwatch_core::EventSource;
use std::ffi::CString;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Non-blocking, close-on-exec inotify descriptor
///
/// The descriptor is closed when the value drops.
#[derive(Debug)]
pub struct Inotify {
    fd: OwnedFd,
}

impl Inotify {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::inotify_init1(libc::IN_CLOEXEC | libc::IN_NONBLOCK) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: inotify_init1 returned a fresh descriptor nobody else owns
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self { fd })
    }
}

impl AsFd for Inotify {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl EventSource for Inotify {
    fn add_watch(&self, path: &Path, mask: u32) -> io::Result<u32> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))?;

        let wd = unsafe { libc::inotify_add_watch(self.fd.as_raw_fd(), c_path.as_ptr(), mask) };
        if wd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(wd as u32)
    }

    fn rm_watch(&self, wd: u32) -> io::Result<()> {
        let result = unsafe { libc::inotify_rm_watch(self.fd.as_raw_fd(), wd as libc::c_int) };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn read_events(&self, buf: &mut [u8]) -> io::Result<usize> {
        // EAGAIN maps to WouldBlock, EINVAL (buffer too small) to InvalidInput
        let count = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if count < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(count as usize)
    }
}
