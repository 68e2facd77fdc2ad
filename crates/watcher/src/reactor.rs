//! Reactor thread and the state it shares with consumers
//!
//! The reactor is the only reader of the inotify descriptor and the only
//! writer of buffered bytes. It blocks in epoll without holding the lock and
//! takes the lock only to append what it read and wake the consumers.
//!
//! It idles on the `demand` condvar while nobody is waiting, so an unwatched
//! burst stays queued in the kernel rather than in our buffer.

use crate::platform::{Inotify, Poller, Waker, SOURCE_TOKEN, WAKER_TOKEN};
use inwatch_core::{EventPipeline, EventSource, FillOutcome};
use nix::errno::Errno;
use nix::sys::epoll::EpollEvent;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// The three OS handles a watcher owns
///
/// Lives in an `Arc` so an epoll wait in flight keeps the descriptors open
/// after `close()` has dropped the watcher's reference.
pub(crate) struct Handles {
    pub(crate) inotify: Inotify,
    pub(crate) poller: Poller,
    pub(crate) waker: Waker,
}

/// Everything guarded by the watcher lock
pub(crate) struct State {
    pub(crate) pipeline: EventPipeline,
    /// `None` once closed
    pub(crate) handles: Option<Arc<Handles>>,
    /// Consumers blocked in `wait_event`
    pub(crate) waiting: usize,
    /// An epoll iteration is in flight. Diagnostic only: the single reactor
    /// thread serializes iterations, and the flag is reported by `Debug`
    pub(crate) running: bool,
    pub(crate) closed: bool,
    pub(crate) reactor: Option<JoinHandle<()>>,
}

impl State {
    /// Permanently close: no more reads, handles released
    ///
    /// Returns the handles so the caller can signal the waker after
    /// dropping the lock.
    pub(crate) fn shut(&mut self) -> Option<Arc<Handles>> {
        self.closed = true;
        self.handles.take()
    }
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
    /// Signalled when events arrive or the watcher closes
    pub(crate) data_ready: Condvar,
    /// Signalled when a consumer starts waiting or the watcher closes
    pub(crate) demand: Condvar,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }
}

/// Reactor thread body
pub(crate) fn run(shared: Arc<Shared>, max_ready_events: usize) {
    let mut events = vec![EpollEvent::empty(); max_ready_events];
    debug!("Reactor started");

    loop {
        let Some(handles) = begin_iteration(&shared) else {
            break;
        };

        let ready = match handles.poller.wait(&mut events) {
            Ok(ready) => ready,
            Err(Errno::EINTR) => {
                shared.lock().running = false;
                continue;
            }
            Err(e) => {
                error!("epoll wait failed, closing watcher: {}", e);
                fail(&shared);
                break;
            }
        };

        for event in &events[..ready] {
            match event.data() {
                SOURCE_TOKEN => {
                    if !fill(&shared, &handles.inotify) {
                        return;
                    }
                }
                WAKER_TOKEN => handles.waker.reset(),
                token => warn!("Ignoring readiness for unexpected token {}", token),
            }
        }

        shared.lock().running = false;
    }

    debug!("Reactor stopped");
}

/// Block until a consumer is waiting, then claim one iteration
///
/// Returns `None` when the watcher is closed; waiters are woken on the way out.
fn begin_iteration(shared: &Shared) -> Option<Arc<Handles>> {
    let mut state = shared.lock();

    while state.waiting == 0 && !state.closed {
        shared.demand.wait(&mut state);
    }

    let handles = match (&state.handles, state.closed) {
        (Some(handles), false) => Arc::clone(handles),
        _ => {
            state.running = false;
            shared.data_ready.notify_all();
            return None;
        }
    };

    state.running = true;
    Some(handles)
}

/// Pull whatever the source has into the buffer and wake consumers
///
/// Returns false when the read failed fatally and the watcher was closed.
pub(crate) fn fill(shared: &Shared, source: &dyn EventSource) -> bool {
    let mut state = shared.lock();
    if state.closed {
        return true;
    }

    match state.pipeline.fill_from(source) {
        Ok(FillOutcome::Read(count)) => trace!("Read {} bytes", count),
        Ok(FillOutcome::Empty) => {}
        Ok(FillOutcome::Deferred) => debug!("Buffer full, read deferred"),
        Err(e) => {
            error!("Reading inotify events failed, closing watcher: {}", e);
            close_after_failure(shared, &mut state);
            return false;
        }
    }

    shared.data_ready.notify_all();
    true
}

/// Close the watcher after an unrecoverable reactor error
pub(crate) fn fail(shared: &Shared) {
    let mut state = shared.lock();
    close_after_failure(shared, &mut state);
}

fn close_after_failure(shared: &Shared, state: &mut State) {
    state.running = false;
    if let Some(handles) = state.shut() {
        if let Err(e) = handles.waker.wake() {
            warn!("Failed to wake reactor after failure: {}", e);
        }
    }
    shared.data_ready.notify_all();
    shared.demand.notify_all();
    info!("Watcher closed after reactor failure");
}
