// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The resume/yield handoff a coroutine and its resumer share.
//!
//! Exactly one side holds the baton at a time. `resume` hands it to the
//! coroutine with a payload attached; `yield_now` hands it back with a
//! different payload attached. Both sides block on the same mutex/condvar
//! pair while they don't hold the baton, so at most one of them is ever
//! touching the coroutine's state.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Turn {
    Caller,
    Coroutine,
}

struct RendState<Item> {
    turn: Turn,
    resume_payload: Option<Item>,
    yield_payload: Option<Item>,
}

/// The coroutine was canceled while parked waiting for its next turn.
pub(super) struct CancelSignal;

/// Backstop so a missed wakeup can't hang a wait forever; the condvar is
/// notified on every state change, this is only a safety net.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub(super) struct Rendezvous<Item> {
    state: Mutex<RendState<Item>>,
    cv: Condvar,
    cancel: AtomicBool,
}

impl<Item> Rendezvous<Item> {
    pub(super) fn new() -> Self {
        Self {
            state: Mutex::new(RendState { turn: Turn::Caller, resume_payload: None, yield_payload: None }),
            cv: Condvar::new(),
            cancel: AtomicBool::new(false),
        }
    }

    pub(super) fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Returns `true` the first time it's called on a given rendezvous,
    /// `false` on every call after that.
    pub(super) fn request_cancel(&self) -> bool {
        let first = !self.cancel.swap(true, Ordering::SeqCst);
        self.cv.notify_all();
        first
    }

    /// Caller side: hand the baton to the coroutine with `payload`, then
    /// block until it hands the baton back. `None` means the coroutine
    /// reached a terminal state without producing a payload (canceled
    /// before it ever observed a resume).
    pub(super) fn resume(&self, payload: Item) -> Option<Item> {
        let mut guard = self.state.lock();
        guard.resume_payload = Some(payload);
        guard.turn = Turn::Coroutine;
        self.cv.notify_all();
        while guard.turn != Turn::Caller {
            self.cv.wait_for(&mut guard, POLL_INTERVAL);
        }
        guard.yield_payload.take()
    }

    /// Coroutine side: park until the first resume, consuming whatever
    /// payload it was started with. Bails out early via `Err(CancelSignal)`
    /// if cancellation was requested before the coroutine ever ran.
    pub(super) fn wait_for_start(&self) -> Result<Item, CancelSignal> {
        let mut guard = self.state.lock();
        loop {
            if self.is_canceled() {
                return Err(CancelSignal);
            }
            if guard.turn == Turn::Coroutine {
                return Ok(guard.resume_payload.take().expect("resume always writes a payload first"));
            }
            self.cv.wait_for(&mut guard, POLL_INTERVAL);
        }
    }

    /// Coroutine side: hand the baton back with `payload`, then block until
    /// resumed again. Bails out via `Err(CancelSignal)` if cancellation is
    /// observed while parked.
    pub(super) fn yield_now(&self, payload: Item) -> Result<Item, CancelSignal> {
        let mut guard = self.state.lock();
        guard.yield_payload = Some(payload);
        guard.turn = Turn::Caller;
        self.cv.notify_all();
        loop {
            if self.is_canceled() {
                return Err(CancelSignal);
            }
            if guard.turn == Turn::Coroutine {
                return Ok(guard.resume_payload.take().expect("resume always writes a payload first"));
            }
            self.cv.wait_for(&mut guard, POLL_INTERVAL);
        }
    }

    /// Coroutine side: the trampoline's final handoff once the body has
    /// returned (normally or via cancellation). No further resume is
    /// expected; this only unblocks whichever `resume` call is waiting.
    pub(super) fn finish(&self, payload: Option<Item>) {
        let mut guard = self.state.lock();
        guard.yield_payload = payload;
        guard.turn = Turn::Caller;
        self.cv.notify_all();
    }
}
