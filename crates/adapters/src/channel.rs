// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded/unbounded FIFO channel, the L0 collaborator every other
//! subsystem builds queues on top of (dataflow edges, the supervisor's exit
//! channel, coroutine resume/yield slots all use it, directly or as a model).
//!
//! Item destruction is not a separate callback here — dropping the item is
//! the destructor. Whatever is left in the queue when the channel is
//! dropped is dropped in FIFO order along with it.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Capacity of zero means unbounded.
pub const UNBOUNDED: usize = 0;

#[derive(Debug)]
struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

/// A FIFO channel shared between a sender side and a receiver side.
///
/// `Channel` is `Clone`: clones share the same underlying queue, so the same
/// handle type serves both the producer and consumer side.
pub struct Channel<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

/// Outcome of a non-blocking receive attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum TryRecvOutcome<T> {
    Got(T),
    Empty,
    Closed,
}

/// Outcome of a deadline-bounded receive attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum RecvOutcome<T> {
    Got(T),
    Closed,
    TimedOut,
}

/// Error returned by a blocking `send` when the channel is already closed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("channel closed")]
pub struct SendError<T>(pub T);

/// Error returned by `try_send`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrySendError<T> {
    #[error("channel closed")]
    Closed(T),
    #[error("channel full")]
    Full(T),
}

impl<T> Channel<T> {
    /// `capacity == 0` creates an unbounded channel; any blocking `send`
    /// then always succeeds immediately (short of allocation failure).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State { queue: VecDeque::new(), closed: false }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(UNBOUNDED)
    }

    fn is_bounded(&self) -> bool {
        self.inner.capacity != UNBOUNDED
    }

    /// Blocking send. Waits for room if the channel is bounded and full.
    /// Returns the item back if the channel is closed.
    pub fn send(&self, item: T) -> Result<(), SendError<T>> {
        let mut state = self.inner.state.lock();
        loop {
            if state.closed {
                return Err(SendError(item));
            }
            if !self.is_bounded() || state.queue.len() < self.inner.capacity {
                state.queue.push_back(item);
                self.inner.not_empty.notify_one();
                return Ok(());
            }
            self.inner.not_full.wait(&mut state);
        }
    }

    /// Non-blocking send: fails immediately instead of waiting for room.
    pub fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(TrySendError::Closed(item));
        }
        if self.is_bounded() && state.queue.len() >= self.inner.capacity {
            return Err(TrySendError::Full(item));
        }
        state.queue.push_back(item);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking receive: `Empty` if nothing is queued and the channel
    /// is still open, `Closed` if it is closed and drained.
    pub fn try_recv(&self) -> TryRecvOutcome<T> {
        let mut state = self.inner.state.lock();
        match state.queue.pop_front() {
            Some(item) => {
                self.inner.not_full.notify_one();
                TryRecvOutcome::Got(item)
            }
            None if state.closed => TryRecvOutcome::Closed,
            None => TryRecvOutcome::Empty,
        }
    }

    /// Receive, blocking until an item arrives, the channel closes, or
    /// `deadline` passes. `deadline == None` means "block until the next
    /// event or close", used by the supervisor's exit channel.
    pub fn recv_deadline(&self, deadline: Option<Instant>) -> RecvOutcome<T> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(item) = state.queue.pop_front() {
                self.inner.not_full.notify_one();
                return RecvOutcome::Got(item);
            }
            if state.closed {
                return RecvOutcome::Closed;
            }
            match deadline {
                None => self.inner.not_empty.wait(&mut state),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return RecvOutcome::TimedOut;
                    }
                    let timed_out = self.inner.not_empty.wait_for(&mut state, deadline - now);
                    if timed_out.timed_out() && state.queue.is_empty() && !state.closed {
                        return RecvOutcome::TimedOut;
                    }
                }
            }
        }
    }

    /// Convenience wrapper for a relative timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> RecvOutcome<T> {
        self.recv_deadline(Some(Instant::now() + timeout))
    }

    /// Close the channel. Wakes every blocked sender and receiver; queued
    /// items are still delivered via `try_recv`/`recv_deadline` until
    /// drained, then both report `Closed`. Dropping the `Channel` (all
    /// clones) drops any items still queued.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn unbounded_send_never_blocks() {
        let ch = Channel::unbounded();
        for i in 0..1000 {
            ch.send(i).unwrap();
        }
        assert_eq!(ch.len(), 1000);
    }

    #[test]
    fn bounded_try_send_fails_when_full() {
        let ch = Channel::new(2);
        ch.try_send(1).unwrap();
        ch.try_send(2).unwrap();
        assert_eq!(ch.try_send(3), Err(TrySendError::Full(3)));
    }

    #[test]
    fn fifo_order_preserved() {
        let ch = Channel::unbounded();
        ch.send("a").unwrap();
        ch.send("b").unwrap();
        ch.send("c").unwrap();
        assert_eq!(ch.try_recv(), TryRecvOutcome::Got("a"));
        assert_eq!(ch.try_recv(), TryRecvOutcome::Got("b"));
        assert_eq!(ch.try_recv(), TryRecvOutcome::Got("c"));
    }

    #[test]
    fn try_recv_empty_then_closed() {
        let ch: Channel<i32> = Channel::unbounded();
        assert_eq!(ch.try_recv(), TryRecvOutcome::Empty);
        ch.close();
        assert_eq!(ch.try_recv(), TryRecvOutcome::Closed);
    }

    #[test]
    fn send_after_close_returns_item() {
        let ch = Channel::new(4);
        ch.close();
        assert_eq!(ch.send(42), Err(SendError(42)));
    }

    #[test]
    fn recv_deadline_times_out_when_empty() {
        let ch: Channel<i32> = Channel::unbounded();
        let outcome = ch.recv_deadline(Some(Instant::now() + Duration::from_millis(20)));
        assert_eq!(outcome, RecvOutcome::TimedOut);
    }

    #[test]
    fn blocking_send_wakes_on_room() {
        let ch = Channel::new(1);
        ch.send(1).unwrap();
        let ch2 = ch.clone();
        let handle = thread::spawn(move || ch2.send(2).unwrap());
        thread::sleep(Duration::from_millis(10));
        assert_eq!(ch.try_recv(), TryRecvOutcome::Got(1));
        handle.join().unwrap();
        assert_eq!(ch.try_recv(), TryRecvOutcome::Got(2));
    }

    #[test]
    fn blocking_recv_wakes_on_send() {
        let ch: Channel<i32> = Channel::unbounded();
        let ch2 = ch.clone();
        let handle = thread::spawn(move || ch2.recv_deadline(None));
        thread::sleep(Duration::from_millis(10));
        ch.send(7).unwrap();
        assert_eq!(handle.join().unwrap(), RecvOutcome::Got(7));
    }

    #[test]
    fn dropping_channel_drops_queued_items() {
        struct DropCounter(Arc<std::sync::atomic::AtomicUsize>);
        impl Drop for DropCounter {
            fn drop(&mut self) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ch = Channel::unbounded();
        ch.send(DropCounter(counter.clone())).unwrap();
        ch.send(DropCounter(counter.clone())).unwrap();
        drop(ch);
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
