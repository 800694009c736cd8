// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push-based reactive streams: demand-driven backpressure, operator
//! composition, and event-loop-backed sources.
//!
//! A `Stream<Item>` is the broadcast primitive every operator and source
//! builds on: subscribers register demand, emission respects it, and
//! whatever can't be delivered immediately is buffered until demand shows
//! up. Multi-subscriber fan-out means an emitted item may need to reach
//! more than one callback, so `Item: Clone` (see DESIGN.md).

pub mod operators;
pub mod sources;

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;

use parking_lot::Mutex;
use rt_core::{StreamError, StreamId, StreamState, SubscriptionId};
use std::collections::VecDeque;
use std::sync::Arc;

type NextFn<Item> = Arc<Mutex<dyn FnMut(Item) + Send>>;
type ErrorFn = Arc<Mutex<dyn FnMut(i32) + Send>>;
type CompleteFn = Arc<Mutex<dyn FnMut() + Send>>;

struct SubEntry<Item> {
    id: SubscriptionId,
    demand: u64,
    unsubscribed: bool,
    next: NextFn<Item>,
    error: ErrorFn,
    complete: CompleteFn,
}

struct Inner<Item> {
    state: StreamState,
    buffer: VecDeque<Item>,
    subs: Vec<SubEntry<Item>>,
}

/// A push source with per-subscriber demand accounting.
///
/// Cloning a `Stream` shares the same underlying broadcast state (it's a
/// handle, like `rt_adapters::Channel`).
pub struct Stream<Item: Clone + Send + 'static> {
    id: StreamId,
    inner: Arc<Mutex<Inner<Item>>>,
}

impl<Item: Clone + Send + 'static> Clone for Stream<Item> {
    fn clone(&self) -> Self {
        Self { id: self.id, inner: self.inner.clone() }
    }
}

impl<Item: Clone + Send + 'static> Default for Stream<Item> {
    fn default() -> Self {
        Self::new()
    }
}

enum TerminalAction {
    Error(i32),
    Complete,
}

impl<Item: Clone + Send + 'static> Stream<Item> {
    pub fn new() -> Self {
        Self {
            id: StreamId::new(),
            inner: Arc::new(Mutex::new(Inner { state: StreamState::Pending, buffer: VecDeque::new(), subs: Vec::new() })),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn state(&self) -> StreamState {
        self.inner.lock().state.clone()
    }

    /// Register a new subscription. If the stream is already terminal, the
    /// matching terminal callback fires synchronously, once, and the
    /// subscription is otherwise inert.
    pub fn subscribe(
        &self,
        next: impl FnMut(Item) + Send + 'static,
        error: impl FnMut(i32) + Send + 'static,
        complete: impl FnMut() + Send + 'static,
    ) -> Subscription<Item> {
        let id = SubscriptionId::new();
        let next: NextFn<Item> = Arc::new(Mutex::new(next));
        let error: ErrorFn = Arc::new(Mutex::new(error));
        let complete: CompleteFn = Arc::new(Mutex::new(complete));

        let terminal = {
            let mut inner = self.inner.lock();
            match &inner.state {
                StreamState::Pending => {
                    inner.subs.push(SubEntry {
                        id,
                        demand: 0,
                        unsubscribed: false,
                        next: next.clone(),
                        error: error.clone(),
                        complete: complete.clone(),
                    });
                    None
                }
                StreamState::Error(code) => Some(TerminalAction::Error(*code)),
                StreamState::Completed => Some(TerminalAction::Complete),
            }
        };
        match terminal {
            Some(TerminalAction::Error(code)) => (error.lock())(code),
            Some(TerminalAction::Complete) => (complete.lock())(),
            None => {}
        }
        tracing::debug!(stream = %self.id, subscription = %id, "subscribed");
        Subscription { id, stream: self.inner.clone() }
    }

    /// Push `item` to the stream. Delivers to every subscriber with
    /// positive demand (decrementing it), or buffers the item if none had
    /// demand. Returns `Err` if the stream is already terminal.
    pub fn emit_next(&self, item: Item) -> Result<(), StreamError> {
        let mut targets: Vec<NextFn<Item>> = Vec::new();
        let mut buffered = false;
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                tracing::debug!(stream = %self.id, "dropping item emitted after stream went terminal");
                return Err(StreamError::AlreadyTerminal);
            }
            for sub in inner.subs.iter_mut() {
                if !sub.unsubscribed && sub.demand > 0 {
                    sub.demand -= 1;
                    targets.push(sub.next.clone());
                }
            }
            if targets.is_empty() {
                inner.buffer.push_back(item);
                buffered = true;
            }
        }
        if buffered {
            tracing::debug!(stream = %self.id, "buffered item, no subscriber demand");
            return Ok(());
        }
        tracing::debug!(stream = %self.id, subscribers = targets.len(), "delivering item");
        let last = targets.len() - 1;
        for (index, target) in targets.iter().enumerate() {
            if index == last {
                (target.lock())(item);
                break;
            }
            (target.lock())(item.clone());
        }
        Ok(())
    }

    /// Transition to `Error(code)`, dropping any buffered items and
    /// broadcasting to every still-subscribed subscriber.
    pub fn emit_error(&self, code: i32) -> Result<(), StreamError> {
        let mut targets: Vec<ErrorFn> = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return Err(StreamError::AlreadyTerminal);
            }
            inner.state = StreamState::Error(code);
            inner.buffer.clear();
            for sub in inner.subs.iter() {
                if !sub.unsubscribed {
                    targets.push(sub.error.clone());
                }
            }
            inner.subs.clear();
        }
        tracing::warn!(stream = %self.id, code, "stream errored");
        for target in &targets {
            (target.lock())(code);
        }
        Ok(())
    }

    /// Transition to `Completed`, dropping any buffered items and
    /// broadcasting to every still-subscribed subscriber.
    pub fn emit_complete(&self) -> Result<(), StreamError> {
        let mut targets: Vec<CompleteFn> = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return Err(StreamError::AlreadyTerminal);
            }
            inner.state = StreamState::Completed;
            inner.buffer.clear();
            for sub in inner.subs.iter() {
                if !sub.unsubscribed {
                    targets.push(sub.complete.clone());
                }
            }
            inner.subs.clear();
        }
        tracing::info!(stream = %self.id, "stream completed");
        for target in &targets {
            (target.lock())();
        }
        Ok(())
    }
}

/// A live registration against a [`Stream`]. Dropping this has no effect —
/// call [`Subscription::unsubscribe`] explicitly; this is a handle, not an
/// RAII guard.
pub struct Subscription<Item: Clone + Send + 'static> {
    id: SubscriptionId,
    stream: Arc<Mutex<Inner<Item>>>,
}

impl<Item: Clone + Send + 'static> Subscription<Item> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Add `n` to this subscription's demand and drain as many buffered
    /// items as that now allows.
    pub fn request(&self, n: u64) {
        let mut drained: Vec<(NextFn<Item>, Item)> = Vec::new();
        {
            let mut guard = self.stream.lock();
            let inner = &mut *guard;
            let Some(sub) = inner.subs.iter_mut().find(|s| s.id == self.id && !s.unsubscribed) else {
                return;
            };
            sub.demand = sub.demand.saturating_add(n);
            while sub.demand > 0 {
                let Some(item) = inner.buffer.pop_front() else { break };
                sub.demand -= 1;
                drained.push((sub.next.clone(), item));
            }
        }
        for (callback, item) in drained {
            (callback.lock())(item);
        }
    }

    pub fn is_unsubscribed(&self) -> bool {
        let inner = self.stream.lock();
        inner.subs.iter().find(|s| s.id == self.id).map(|s| s.unsubscribed).unwrap_or(true)
    }

    /// Mark this subscription inert. Its callbacks will never be invoked
    /// again, even by emissions already in flight.
    pub fn unsubscribe(&self) {
        let mut inner = self.stream.lock();
        if let Some(sub) = inner.subs.iter_mut().find(|s| s.id == self.id) {
            sub.unsubscribed = true;
        }
    }
}
