// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event-loop substrate behind stream timers (`timer`, `debounce`) and
//! fd-backed sources (`from_fd`). The platform event loop itself — I/O
//! readiness, timer scheduling, a monotonic clock — is treated as external
//! infrastructure; this module realizes only the contract consumed from it:
//! `register_io`, `register_timer`, `unregister`.

use parking_lot::{Condvar, Mutex};
use std::collections::BinaryHeap;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An opaque handle to a registration, used to `unregister` it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

impl RegistrationId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// A readiness-notification source, the portable stand-in for a raw OS
/// file descriptor consumed by `from_fd(fd, mask)`. Real adapters wrap a
/// socket, pipe, or other `AsRawFd` type.
pub trait FdSource: Send + Sync + 'static {
    #[cfg(unix)]
    fn raw_fd(&self) -> std::os::unix::io::RawFd;
}

/// Which readiness conditions a registration cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoMask {
    pub readable: bool,
    pub writable: bool,
}

impl IoMask {
    pub const READABLE: IoMask = IoMask { readable: true, writable: false };
    pub const WRITABLE: IoMask = IoMask { readable: false, writable: true };
    pub const BOTH: IoMask = IoMask { readable: true, writable: true };
}

pub(crate) type Callback = Box<dyn FnMut() + Send>;

/// The event loop: register timers and IO sources, get a callback invoked
/// on fire/readiness, and unregister either kind through the same id space.
pub trait EventLoop: Send + Sync + 'static {
    /// Schedule `callback` to fire once at `first_deadline`, and then every
    /// `period` thereafter if `period` is `Some` (a one-shot timer if
    /// `period` is `None`).
    fn register_timer(&self, first_deadline: Instant, period: Option<Duration>, callback: Callback) -> RegistrationId;

    /// Invoke `callback` whenever `source` becomes ready per `mask`.
    fn register_io(&self, source: Arc<dyn FdSource>, mask: IoMask, callback: Callback) -> RegistrationId;

    fn unregister(&self, id: RegistrationId);
}

struct TimerEntry {
    id: RegistrationId,
    deadline: Instant,
    period: Option<Duration>,
    callback: Callback,
}

// Min-heap by deadline: reverse the natural `Ord` on `Instant`.
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}
impl Eq for TimerEntry {}
impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.deadline.cmp(&self.deadline)
    }
}

struct IoEntry {
    id: RegistrationId,
    #[cfg_attr(not(unix), allow(dead_code))]
    source: Arc<dyn FdSource>,
    #[cfg_attr(not(unix), allow(dead_code))]
    mask: IoMask,
    callback: Callback,
}

struct ReactorState {
    timers: BinaryHeap<TimerEntry>,
    io: Vec<IoEntry>,
    removed: std::collections::HashSet<RegistrationId>,
    shutdown: bool,
}

/// Default event loop: one dedicated background thread running a timer
/// wheel plus (on unix) a `poll(2)`-based readiness check.
pub struct ReactorEventLoop {
    state: Arc<Mutex<ReactorState>>,
    wake: Arc<Condvar>,
    next_id: Arc<AtomicU64>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl ReactorEventLoop {
    pub fn new() -> Self {
        let state = Arc::new(Mutex::new(ReactorState {
            timers: BinaryHeap::new(),
            io: Vec::new(),
            removed: std::collections::HashSet::new(),
            shutdown: false,
        }));
        let wake = Arc::new(Condvar::new());
        let thread_state = state.clone();
        let thread_wake = wake.clone();
        let thread = std::thread::Builder::new()
            .name("rt-event-loop".into())
            .spawn(move || reactor_loop(thread_state, thread_wake))
            .expect("spawning the event loop thread should not fail");
        Self { state, wake, next_id: Arc::new(AtomicU64::new(1)), thread: Some(thread) }
    }

    fn alloc_id(&self) -> RegistrationId {
        RegistrationId(self.next_id.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl Default for ReactorEventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ReactorEventLoop {
    fn drop(&mut self) {
        {
            let mut state = self.state.lock();
            state.shutdown = true;
        }
        self.wake.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl EventLoop for ReactorEventLoop {
    fn register_timer(&self, first_deadline: Instant, period: Option<Duration>, callback: Callback) -> RegistrationId {
        let id = self.alloc_id();
        let mut state = self.state.lock();
        state.timers.push(TimerEntry { id, deadline: first_deadline, period, callback });
        drop(state);
        self.wake.notify_all();
        id
    }

    fn register_io(&self, source: Arc<dyn FdSource>, mask: IoMask, callback: Callback) -> RegistrationId {
        let id = self.alloc_id();
        let mut state = self.state.lock();
        state.io.push(IoEntry { id, source, mask, callback });
        drop(state);
        self.wake.notify_all();
        id
    }

    fn unregister(&self, id: RegistrationId) {
        let mut state = self.state.lock();
        state.removed.insert(id);
        state.io.retain(|e| e.id != id);
        drop(state);
        self.wake.notify_all();
    }
}

const IO_POLL_INTERVAL: Duration = Duration::from_millis(25);

fn reactor_loop(state: Arc<Mutex<ReactorState>>, wake: Arc<Condvar>) {
    loop {
        run_due_timers(&state);
        poll_io(&state);

        let mut guard = state.lock();
        if guard.shutdown {
            return;
        }
        let now = Instant::now();
        let wait_for =
            guard.timers.peek().map(|t| t.deadline.saturating_duration_since(now)).unwrap_or(IO_POLL_INTERVAL);
        let capped = wait_for.min(IO_POLL_INTERVAL);
        wake.wait_for(&mut guard, capped);
    }
}

/// Pop and invoke every timer that is due, rescheduling periodic ones.
fn run_due_timers(state: &Arc<Mutex<ReactorState>>) {
    loop {
        let ready = {
            let mut guard = state.lock();
            let now = Instant::now();
            match guard.timers.peek() {
                Some(top) if top.deadline <= now => guard.timers.pop(),
                _ => None,
            }
        };
        let Some(mut entry) = ready else { break };
        {
            let mut guard = state.lock();
            if guard.removed.remove(&entry.id) {
                continue;
            }
        }
        (entry.callback)();
        if let Some(period) = entry.period {
            let mut guard = state.lock();
            let next_deadline = Instant::now() + period;
            guard.timers.push(TimerEntry { id: entry.id, deadline: next_deadline, period: Some(period), callback: entry.callback });
        }
    }
}

#[cfg(unix)]
fn poll_io(state: &Arc<Mutex<ReactorState>>) {
    use std::os::unix::io::RawFd;

    let (mut fds, mut callbacks): (Vec<libc::pollfd>, Vec<(RegistrationId, RawFd)>) = {
        let guard = state.lock();
        let mut fds = Vec::with_capacity(guard.io.len());
        let mut meta = Vec::with_capacity(guard.io.len());
        for entry in &guard.io {
            let mut events = 0;
            if entry.mask.readable {
                events |= libc::POLLIN;
            }
            if entry.mask.writable {
                events |= libc::POLLOUT;
            }
            fds.push(libc::pollfd { fd: entry.source.raw_fd(), events, revents: 0 });
            meta.push((entry.id, entry.source.raw_fd()));
        }
        (fds, meta)
    };
    if fds.is_empty() {
        return;
    }
    // A zero timeout: this is called on every reactor tick, which already
    // sleeps between ticks via the condvar wait above.
    let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, 0) };
    if ready <= 0 {
        return;
    }
    let mut fired = Vec::new();
    for (pfd, (id, _fd)) in fds.iter().zip(callbacks.drain(..)) {
        if pfd.revents != 0 {
            fired.push(id);
        }
    }
    if fired.is_empty() {
        return;
    }
    let mut guard = state.lock();
    for entry in guard.io.iter_mut() {
        if fired.contains(&entry.id) {
            (entry.callback)();
        }
    }
}

#[cfg(not(unix))]
fn poll_io(_state: &Arc<Mutex<ReactorState>>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    #[test]
    fn one_shot_timer_fires_once() {
        let reactor = ReactorEventLoop::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        reactor.register_timer(Instant::now() + Duration::from_millis(10), None, Box::new(move || {
            count2.fetch_add(1, AtomicOrdering::SeqCst);
        }));
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(count.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn periodic_timer_fires_multiple_times() {
        let reactor = ReactorEventLoop::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        reactor.register_timer(
            Instant::now() + Duration::from_millis(5),
            Some(Duration::from_millis(15)),
            Box::new(move || {
                count2.fetch_add(1, AtomicOrdering::SeqCst);
            }),
        );
        std::thread::sleep(Duration::from_millis(90));
        assert!(count.load(AtomicOrdering::SeqCst) >= 3, "count = {}", count.load(AtomicOrdering::SeqCst));
    }

    #[test]
    fn unregister_prevents_further_fires() {
        let reactor = ReactorEventLoop::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let id = reactor.register_timer(
            Instant::now() + Duration::from_millis(5),
            Some(Duration::from_millis(10)),
            Box::new(move || {
                count2.fetch_add(1, AtomicOrdering::SeqCst);
            }),
        );
        std::thread::sleep(Duration::from_millis(20));
        reactor.unregister(id);
        let after_unregister = count.load(AtomicOrdering::SeqCst);
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(count.load(AtomicOrdering::SeqCst), after_unregister);
    }
}
