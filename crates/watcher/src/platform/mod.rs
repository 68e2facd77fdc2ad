//! Platform-specific event sources and multiplexers

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "linux")]
pub use linux::{Inotify, Poller, Waker, SOURCE_TOKEN, WAKER_TOKEN};
