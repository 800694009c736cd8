// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative coroutines: a user-visible handle with bidirectional
//! payload exchange and cooperative cancellation, built on top of
//! [`rt_adapters::GreenThreadBackend`].
//!
//! A coroutine's entry function doesn't thread a "yielder" object through
//! its call stack — it calls the free function [`yield_now`] from wherever
//! it happens to be, as a free operation on "the currently running
//! coroutine". The runtime records which coroutine is running in
//! thread-local state (one dedicated OS thread per coroutine, so there's
//! never more than one at a time) and `yield_now` looks it up there.

mod rendezvous;

#[cfg(test)]
#[path = "coroutine_tests.rs"]
mod tests;

use rendezvous::{CancelSignal, Rendezvous};
use rt_adapters::GreenThreadBackend;
use rt_core::{CoroutineError, CoroutineId, CoroutineState};
use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Type-erased view of a running coroutine's rendezvous, stored in
/// thread-local state so [`yield_now`] can find it without an explicit
/// handle. Exists only because a single thread-local slot can't otherwise
/// hold rendezvous objects for arbitrary `Item` types.
trait ErasedRendezvous: Send + Sync {
    fn yield_any(&self, payload: Box<dyn Any + Send>) -> Result<Box<dyn Any + Send>, CancelSignal>;
    fn is_canceled(&self) -> bool;
}

impl<Item: Send + 'static> ErasedRendezvous for Rendezvous<Item> {
    fn yield_any(&self, payload: Box<dyn Any + Send>) -> Result<Box<dyn Any + Send>, CancelSignal> {
        let item = *payload.downcast::<Item>().expect("yield_now called with the running coroutine's Item type");
        let resumed = self.yield_now(item)?;
        Ok(Box::new(resumed))
    }

    fn is_canceled(&self) -> bool {
        Rendezvous::is_canceled(self)
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn ErasedRendezvous>>> = const { RefCell::new(None) };
}

/// Suspend the currently-running coroutine, handing `payload` to whatever
/// called `resume`, and block until resumed again, returning the payload
/// that resume call supplied.
///
/// # Panics
/// Panics if called from outside a coroutine entry function. If the
/// coroutine is canceled while parked here, this function never returns —
/// it unwinds the coroutine's thread via a private panic payload that the
/// trampoline catches, so ordinary `catch_unwind` in application code
/// should not intercept it (it isn't typed as anything application code can
/// name).
pub fn yield_now<Item: Send + 'static>(payload: Item) -> Item {
    let rendezvous = CURRENT
        .with(|c| c.borrow().clone())
        .expect("yield_now called outside a running coroutine's entry function");
    match rendezvous.yield_any(Box::new(payload)) {
        Ok(boxed) => *boxed.downcast::<Item>().expect("resume payload type matches the running coroutine's Item type"),
        Err(CancelSignal) => std::panic::panic_any(CancelSignal),
    }
}

/// Whether the currently-running coroutine has had cancellation requested.
/// Returns `false` outside a coroutine (nothing to cancel).
pub fn is_canceled() -> bool {
    CURRENT.with(|c| c.borrow().as_ref().map(|r| r.is_canceled()).unwrap_or(false))
}

/// Outcome of a single `resume` call.
#[derive(Debug, PartialEq, Eq)]
pub enum CoroutineOutcome<Item> {
    /// The coroutine suspended again via `yield_now`, carrying this payload.
    Yielded(Item),
    /// The coroutine ran to completion; this is its return value, unless an
    /// earlier `resume` or `join` call already collected it.
    Done(Option<Item>),
    /// The coroutine was canceled (either before it ever ran, or mid-run).
    Canceled,
}

struct Shared<Item> {
    state: parking_lot::Mutex<CoroutineState>,
    rendezvous: Arc<Rendezvous<Item>>,
    result: parking_lot::Mutex<Option<Item>>,
    thread: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// A spawned cooperative coroutine.
pub struct Coroutine<Item: Send + 'static> {
    id: CoroutineId,
    shared: Arc<Shared<Item>>,
}

impl<Item: Send + 'static> Clone for Coroutine<Item> {
    fn clone(&self) -> Self {
        Self { id: self.id, shared: self.shared.clone() }
    }
}

impl<Item: Send + 'static> Coroutine<Item> {
    pub fn id(&self) -> CoroutineId {
        self.id
    }

    pub fn state(&self) -> CoroutineState {
        *self.shared.state.lock()
    }

    pub fn is_alive(&self) -> bool {
        self.state().is_alive()
    }

    pub fn is_canceled(&self) -> bool {
        self.state() == CoroutineState::Canceled
    }

    /// Hand `payload` to the coroutine and run it until it next suspends,
    /// finishes, or is canceled.
    pub fn resume(&self, payload: Item) -> Result<CoroutineOutcome<Item>, CoroutineError> {
        if self.state().is_terminal() {
            return Err(CoroutineError::AlreadyTerminal);
        }
        tracing::debug!(coroutine = %self.id, "resuming coroutine");
        *self.shared.state.lock() = CoroutineState::Running;
        let yielded = self.shared.rendezvous.resume(payload);
        match self.state() {
            CoroutineState::Done => {
                tracing::info!(coroutine = %self.id, "coroutine finished");
                Ok(CoroutineOutcome::Done(self.shared.result.lock().take()))
            }
            CoroutineState::Canceled => {
                tracing::info!(coroutine = %self.id, "coroutine canceled");
                Ok(CoroutineOutcome::Canceled)
            }
            _ => {
                *self.shared.state.lock() = CoroutineState::Ready;
                Ok(CoroutineOutcome::Yielded(
                    yielded.expect("a non-terminal resume always produces a yielded payload"),
                ))
            }
        }
    }

    /// Collect the final result, if the coroutine is `Done` and nobody has
    /// collected it yet. Non-blocking: a coroutine that hasn't reached a
    /// terminal state returns `None` immediately (best effort).
    pub fn join(&self) -> Option<Item> {
        if self.state() != CoroutineState::Done {
            return None;
        }
        self.shared.result.lock().take()
    }

    /// Request cancellation. Returns `Ok(())` the first time this is
    /// called on a still-alive coroutine; returns
    /// [`CoroutineError::AlreadyTerminal`] if the coroutine is already
    /// terminal, or if cancellation was already requested.
    pub fn cancel(&self) -> Result<(), CoroutineError> {
        if self.state().is_terminal() {
            return Err(CoroutineError::AlreadyTerminal);
        }
        if self.shared.rendezvous.request_cancel() {
            tracing::debug!(coroutine = %self.id, "cancellation requested");
            Ok(())
        } else {
            Err(CoroutineError::AlreadyTerminal)
        }
    }

    /// Cancel (if still alive) and wait for the backing thread to exit.
    pub fn destroy(self) {
        if self.is_alive() {
            let _ = self.cancel();
        }
        if let Some(handle) = self.shared.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Spawns coroutines against a configured [`GreenThreadBackend`].
pub struct Scheduler {
    backend: Arc<dyn GreenThreadBackend>,
}

impl Scheduler {
    pub fn new(backend: Arc<dyn GreenThreadBackend>) -> Self {
        Self { backend }
    }

    pub fn with_default_backend() -> Self {
        Self::new(Arc::new(rt_adapters::StdThreadBackend::new()))
    }

    /// Spawn a coroutine. `entry` runs on its own OS thread; it suspends by
    /// calling the free function [`yield_now`]. Returns `None` if the
    /// backend could not start a thread.
    pub fn spawn<Item, F>(&self, entry: F, arg: Item, stack_size: Option<usize>) -> Option<Coroutine<Item>>
    where
        Item: Send + 'static,
        F: FnOnce(Item) -> Item + Send + 'static,
    {
        let id = CoroutineId::new();
        let shared = Arc::new(Shared {
            state: parking_lot::Mutex::new(CoroutineState::Ready),
            rendezvous: Arc::new(Rendezvous::new()),
            result: parking_lot::Mutex::new(None),
            thread: parking_lot::Mutex::new(None),
        });
        let thread_shared = shared.clone();
        let name = format!("rt-coroutine-{id}");
        let body: Box<dyn FnOnce() + Send> = Box::new(move || trampoline(id, entry, arg, thread_shared));
        let handle = match self.backend.spawn(Some(name), stack_size, body) {
            Ok(handle) => handle,
            Err(error) => {
                tracing::warn!(%error, "failed to spawn coroutine backing thread");
                return None;
            }
        };
        *shared.thread.lock() = Some(handle);
        tracing::info!(coroutine = %id, "coroutine spawned");
        Some(Coroutine { id, shared })
    }
}

fn trampoline<Item, F>(id: CoroutineId, entry: F, arg: Item, shared: Arc<Shared<Item>>)
where
    Item: Send + 'static,
    F: FnOnce(Item) -> Item + Send + 'static,
{
    let start_payload = match shared.rendezvous.wait_for_start() {
        Ok(payload) => payload,
        Err(CancelSignal) => {
            *shared.state.lock() = CoroutineState::Canceled;
            shared.rendezvous.finish(None);
            return;
        }
    };

    *shared.state.lock() = CoroutineState::Running;
    CURRENT.with(|c| *c.borrow_mut() = Some(shared.rendezvous.clone() as Arc<dyn ErasedRendezvous>));
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| entry(start_payload)));
    CURRENT.with(|c| c.borrow_mut().take());

    match outcome {
        Ok(result) => {
            *shared.result.lock() = Some(result);
            *shared.state.lock() = CoroutineState::Done;
            tracing::debug!(coroutine = %id, "entry function returned");
        }
        Err(panic_payload) => {
            if panic_payload.downcast_ref::<CancelSignal>().is_some() {
                *shared.state.lock() = CoroutineState::Canceled;
                shared.rendezvous.finish(None);
                return;
            }
            *shared.state.lock() = CoroutineState::Canceled;
            shared.rendezvous.finish(None);
            std::panic::resume_unwind(panic_payload);
        }
    }
    shared.rendezvous.finish(None);
}
