//! Linux file watching for inwatch
//!
//! This crate wires the engine in `inwatch-core` to the kernel:
//! - inotify as the event source
//! - epoll as the multiplexer, with an eventfd waker for shutdown
//! - A lazily started reactor thread that fills the shared buffer
//! - The [`Watcher`] facade consumers block on
//!
//! ```no_run
//! use inwatch_watcher::{EventMask, Watcher};
//!
//! let watcher = Watcher::new()?;
//! watcher.add_watch("/tmp".as_ref(), EventMask::CREATE | EventMask::DELETE)?;
//! let event = watcher.wait_event()?;
//! println!("{} {}", event.event_name(), event.path().display());
//! # Ok::<(), inwatch_watcher::Error>(())
//! ```

#[cfg(not(target_os = "linux"))]
compile_error!("inwatch-watcher only supports Linux");

pub mod platform;
mod reactor;

pub use inwatch_core::{
    Error, EventKind, EventMask, Result, WatchEvent, WatcherConfig, WatcherStats,
};

use inwatch_core::{EventPipeline, EventSource};
use parking_lot::{Condvar, Mutex};
use platform::{Inotify, Poller, Waker, SOURCE_TOKEN, WAKER_TOKEN};
use reactor::{Handles, Shared, State};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Blocking filesystem watcher
///
/// All methods take `&self`; share the watcher across threads with an `Arc`
/// to have several consumers wait at once or to close it from another thread.
pub struct Watcher {
    shared: Arc<Shared>,
    config: WatcherConfig,
}

impl Watcher {
    /// Create a watcher with the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(WatcherConfig::default())
    }

    /// Create a watcher with a custom configuration
    pub fn with_config(config: WatcherConfig) -> Result<Self> {
        config.validate()?;

        let inotify = Inotify::new().map_err(|e| setup("inotify instance", e))?;
        let poller = Poller::new().map_err(|e| setup("epoll instance", e))?;
        let waker = Waker::new().map_err(|e| setup("waker", e))?;

        poller
            .register(&inotify, SOURCE_TOKEN)
            .map_err(|e| setup("inotify registration with epoll", e))?;
        poller
            .register(&waker, WAKER_TOKEN)
            .map_err(|e| setup("waker registration with epoll", e))?;

        let state = State {
            pipeline: EventPipeline::new(&config),
            handles: Some(Arc::new(Handles {
                inotify,
                poller,
                waker,
            })),
            waiting: 0,
            running: false,
            closed: false,
            reactor: None,
        };

        debug!("Watcher created with {:?}", config);

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                data_ready: Condvar::new(),
                demand: Condvar::new(),
            }),
            config,
        })
    }

    /// Watch `path` for the events in `flags`
    ///
    /// Watching the same path again merges `flags` into its existing watch.
    /// Symlinks are watched themselves, not followed.
    pub fn add_watch(&self, path: &Path, flags: EventMask) -> Result<()> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let handles = match (&state.handles, state.closed) {
            (Some(handles), false) => handles,
            _ => return Err(Error::Closed),
        };

        let entry = state.pipeline.register(&handles.inotify, path, flags)?;
        info!("Watching {} (wd {})", entry.path.display(), entry.wd);
        Ok(())
    }

    /// Stop watching `path`
    ///
    /// The kernel confirms with a final `REMOVE` event, after which the path
    /// no longer appears in [`Watcher::watched_paths`].
    pub fn remove_watch(&self, path: &Path) -> Result<()> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let handles = match (&state.handles, state.closed) {
            (Some(handles), false) => handles,
            _ => return Err(Error::Closed),
        };

        let wd = state.pipeline.deregister(&handles.inotify, path)?;
        info!("Removing watch {} on {}", wd, path.display());
        Ok(())
    }

    /// Block until the next event is available
    ///
    /// Events already buffered are still delivered after [`Watcher::close`];
    /// once they are drained every call returns [`Error::Closed`].
    pub fn wait_event(&self) -> Result<WatchEvent> {
        let mut guard = self.shared.lock();

        loop {
            let state = &mut *guard;
            let source = state
                .handles
                .as_deref()
                .map(|handles| &handles.inotify as &dyn EventSource);

            if let Some(event) = state.pipeline.next_event(source)? {
                return Ok(event);
            }

            if state.closed {
                return Err(Error::Closed);
            }

            state.waiting += 1;
            if let Err(e) = self.ensure_reactor(state) {
                state.waiting -= 1;
                return Err(e);
            }
            self.shared.demand.notify_one();

            self.shared.data_ready.wait(&mut guard);
            guard.waiting -= 1;
        }
    }

    /// Close the watcher and release every blocked [`Watcher::wait_event`]
    ///
    /// Idempotent. Descriptors close once the reactor lets go of them.
    pub fn close(&self) {
        let handles = {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.shut()
        };

        if let Some(handles) = handles {
            if let Err(e) = handles.waker.wake() {
                warn!("Failed to wake reactor on close: {}", e);
            }
        }

        self.shared.demand.notify_all();
        self.shared.data_ready.notify_all();
        info!("Watcher closed");
    }

    /// Whether [`Watcher::close`] was called or the reactor failed
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Paths with a live watch, sorted
    ///
    /// Paths whose removal is underway are left out.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let state = self.shared.lock();
        let mut paths: Vec<PathBuf> = state
            .pipeline
            .registry()
            .entries()
            .filter(|entry| !entry.pending_removal)
            .map(|entry| entry.path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Engine counters
    pub fn stats(&self) -> WatcherStats {
        self.shared.lock().pipeline.stats()
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    fn ensure_reactor(&self, state: &mut State) -> Result<()> {
        if state.reactor.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let max_ready_events = self.config.max_ready_events;
        let handle = std::thread::Builder::new()
            .name("inwatch-reactor".to_string())
            .spawn(move || reactor::run(shared, max_ready_events))?;

        state.reactor = Some(handle);
        debug!("Reactor thread spawned");
        Ok(())
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.close();

        let reactor = self.shared.lock().reactor.take();
        if let Some(reactor) = reactor {
            if reactor.join().is_err() {
                warn!("Reactor thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Watcher")
            .field("watches", &state.pipeline.registry().len())
            .field("buffered", &state.pipeline.buffer().len())
            .field("waiting", &state.waiting)
            .field("running", &state.running)
            .field("closed", &state.closed)
            .finish()
    }
}

fn setup(what: &'static str, source: std::io::Error) -> Error {
    Error::Setup { what, source }
}
