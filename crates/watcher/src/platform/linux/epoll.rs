//! epoll multiplexer and the eventfd used to interrupt it

use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};
use nix::sys::eventfd::{EfdFlags, EventFd};
use std::io;
use std::os::fd::AsFd;

/// Token carried by readiness events for the event source
pub const SOURCE_TOKEN: u64 = 0;

/// Token carried by readiness events for the waker
pub const WAKER_TOKEN: u64 = 1;

/// Close-on-exec epoll instance
pub struct Poller {
    epoll: Epoll,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)?;
        Ok(Self { epoll })
    }

    /// Register `fd` for readable interest under `token`
    pub fn register<Fd: AsFd>(&self, fd: Fd, token: u64) -> io::Result<()> {
        self.epoll
            .add(fd, EpollEvent::new(EpollFlags::EPOLLIN, token))?;
        Ok(())
    }

    /// Block until at least one registered descriptor is ready
    ///
    /// `EINTR` is returned as is so the caller can decide to loop.
    pub fn wait(&self, events: &mut [EpollEvent]) -> Result<usize, Errno> {
        self.epoll.wait(events, EpollTimeout::NONE)
    }
}

/// Non-blocking eventfd that makes a [`Poller`] wait return
pub struct Waker {
    fd: EventFd,
}

impl Waker {
    pub fn new() -> io::Result<Self> {
        let fd = EventFd::from_flags(EfdFlags::EFD_CLOEXEC | EfdFlags::EFD_NONBLOCK)?;
        Ok(Self { fd })
    }

    /// Make the waker readable
    pub fn wake(&self) -> io::Result<()> {
        self.fd.write(1)?;
        Ok(())
    }

    /// Drain the counter so the waker stops reporting readable
    pub fn reset(&self) {
        match self.fd.read() {
            Ok(_) | Err(Errno::EAGAIN) => {}
            Err(e) => tracing::warn!("Failed to reset waker: {}", e),
        }
    }
}

impl AsFd for Waker {
    fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
