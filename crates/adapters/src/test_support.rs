// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic test doubles for the L0 adapters.
//!
//! [`ManualEventLoop`] replaces [`ReactorEventLoop`](crate::ReactorEventLoop)'s
//! wall-clock timer wheel with a virtual one driven entirely by explicit
//! [`ManualEventLoop::advance`] calls, the same way [`rt_core::FakeClock`]
//! replaces [`rt_core::SystemClock`] for the supervisor's restart-window
//! tests. It exists so `rt-engine`'s debounce/timer tests don't have to
//! sleep past real timer intervals and race the reactor's poll cadence.

use crate::event_loop::{Callback, EventLoop, FdSource, IoMask, RegistrationId};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct TimerEntry {
    id: RegistrationId,
    due: Duration,
    period: Option<Duration>,
    callback: Callback,
}

// Min-heap by `due`: reverse the natural `Ord` on `Duration`.
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due
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
        other.due.cmp(&self.due)
    }
}

struct IoEntry {
    id: RegistrationId,
    callback: Callback,
}

struct State {
    elapsed: Duration,
    timers: BinaryHeap<TimerEntry>,
    io: Vec<IoEntry>,
    removed: HashSet<RegistrationId>,
}

/// An [`EventLoop`] with no background thread: time only advances when
/// [`advance`](Self::advance) is called, and IO readiness only fires when
/// [`fire_io`](Self::fire_io) is called. Every timer's deadline is captured
/// relative to its own registration moment, not to the real wall clock, so
/// `advance(interval)` deterministically fires a timer registered with that
/// same `interval` regardless of how long the calling thread actually took.
pub struct ManualEventLoop {
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl ManualEventLoop {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                elapsed: Duration::ZERO,
                timers: BinaryHeap::new(),
                io: Vec::new(),
                removed: HashSet::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// How much virtual time has elapsed since this loop was created.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    /// Advance the virtual clock by `by`, firing (in deadline order) every
    /// timer whose deadline now falls at or before the new virtual time,
    /// rescheduling periodic ones. A callback that registers or
    /// unregisters a timer during this call is honored before `advance`
    /// returns, matching the reactor's own re-entrant behavior.
    pub fn advance(&self, by: Duration) {
        let mut guard = self.state.lock();
        guard.elapsed += by;
        loop {
            let due = match guard.timers.peek() {
                Some(top) if top.due <= guard.elapsed => guard.timers.pop(),
                _ => None,
            };
            let Some(mut entry) = due else { break };
            if guard.removed.remove(&entry.id) {
                continue;
            }
            drop(guard);
            (entry.callback)();
            guard = self.state.lock();
            if let Some(period) = entry.period {
                entry.due += period;
                guard.timers.push(entry);
            }
        }
    }

    /// Manually fire the IO callback registered as `id`, as if `source`
    /// just became ready. No-op if `id` is unknown or was unregistered.
    pub fn fire_io(&self, id: RegistrationId) {
        let mut guard = self.state.lock();
        if let Some(entry) = guard.io.iter_mut().find(|e| e.id == id) {
            (entry.callback)();
        }
    }
}

impl Default for ManualEventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop for ManualEventLoop {
    fn register_timer(&self, first_deadline: Instant, period: Option<Duration>, callback: Callback) -> RegistrationId {
        let mut guard = self.state.lock();
        let id = RegistrationId::from_raw(self.next_id.fetch_add(1, AtomicOrdering::Relaxed));
        let relative = first_deadline.saturating_duration_since(Instant::now());
        let due = guard.elapsed + relative;
        guard.timers.push(TimerEntry { id, due, period, callback });
        id
    }

    fn register_io(&self, _source: Arc<dyn FdSource>, _mask: IoMask, callback: Callback) -> RegistrationId {
        let mut guard = self.state.lock();
        let id = RegistrationId::from_raw(self.next_id.fetch_add(1, AtomicOrdering::Relaxed));
        guard.io.push(IoEntry { id, callback });
        id
    }

    fn unregister(&self, id: RegistrationId) {
        let mut guard = self.state.lock();
        guard.removed.insert(id);
        guard.io.retain(|e| e.id != id);
    }
}
