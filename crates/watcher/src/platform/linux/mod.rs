//! Linux backend: inotify as the event source, epoll as the multiplexer

mod epoll;
mod inotify;

pub use epoll::{Poller, Waker, SOURCE_TOKEN, WAKER_TOKEN};
pub use inotify::Inotify;
