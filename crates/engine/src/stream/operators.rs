// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream operators: each one is itself a [`Stream`], subscribed to one or
//! two source streams with effectively unbounded demand, forwarding into
//! its own broadcast state. Composition is just chaining these calls —
//! `take(&filter(&map(&source, f), pred), n)`.

use super::{Stream, Subscription};
use parking_lot::Mutex;
use rt_adapters::EventLoop;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Emit `f(item)` for every upstream item.
pub fn map<In, Out, F>(source: &Stream<In>, mut f: F) -> Stream<Out>
where
    In: Clone + Send + 'static,
    Out: Clone + Send + 'static,
    F: FnMut(In) -> Out + Send + 'static,
{
    let out = Stream::<Out>::new();
    let out_next = out.clone();
    let out_error = out.clone();
    let out_complete = out.clone();
    let sub = source.subscribe(
        move |item| {
            let _ = out_next.emit_next(f(item));
        },
        move |code| {
            let _ = out_error.emit_error(code);
        },
        move || {
            let _ = out_complete.emit_complete();
        },
    );
    sub.request(u64::MAX);
    out
}

/// Forward only items for which `pred` returns `true`; the rest are
/// dropped.
pub fn filter<Item, F>(source: &Stream<Item>, mut pred: F) -> Stream<Item>
where
    Item: Clone + Send + 'static,
    F: FnMut(&Item) -> bool + Send + 'static,
{
    let out = Stream::<Item>::new();
    let out_next = out.clone();
    let out_error = out.clone();
    let out_complete = out.clone();
    let sub = source.subscribe(
        move |item| {
            if pred(&item) {
                let _ = out_next.emit_next(item);
            }
        },
        move |code| {
            let _ = out_error.emit_error(code);
        },
        move || {
            let _ = out_complete.emit_complete();
        },
    );
    sub.request(u64::MAX);
    out
}

/// Forward up to `n` items, then complete and unsubscribe from the source.
pub fn take<Item>(source: &Stream<Item>, n: u64) -> Stream<Item>
where
    Item: Clone + Send + 'static,
{
    let out = Stream::<Item>::new();
    if n == 0 {
        let _ = out.emit_complete();
        return out;
    }

    let remaining = Arc::new(Mutex::new(n));
    let sub_cell: Arc<Mutex<Option<Subscription<Item>>>> = Arc::new(Mutex::new(None));

    let out_next = out.clone();
    let out_error = out.clone();
    let out_complete = out.clone();
    let remaining_next = remaining.clone();
    let sub_cell_next = sub_cell.clone();

    let subscription = source.subscribe(
        move |item| {
            let mut left = remaining_next.lock();
            if *left == 0 {
                return;
            }
            *left -= 1;
            let exhausted = *left == 0;
            drop(left);
            let _ = out_next.emit_next(item);
            if exhausted {
                let _ = out_next.emit_complete();
                if let Some(sub) = sub_cell_next.lock().as_ref() {
                    sub.unsubscribe();
                }
            }
        },
        move |code| {
            let _ = out_error.emit_error(code);
        },
        move || {
            let _ = out_complete.emit_complete();
        },
    );
    *sub_cell.lock() = Some(subscription);
    if let Some(sub) = sub_cell.lock().as_ref() {
        sub.request(n);
    }
    out
}

/// Forward items from either source. Completes once both sources have
/// completed; errors as soon as either source errors.
pub fn merge<Item>(a: &Stream<Item>, b: &Stream<Item>) -> Stream<Item>
where
    Item: Clone + Send + 'static,
{
    let out = Stream::<Item>::new();
    let remaining = Arc::new(Mutex::new(2u8));
    wire_into(a, &out, remaining.clone());
    wire_into(b, &out, remaining);
    out
}

fn wire_into<Item>(source: &Stream<Item>, out: &Stream<Item>, remaining: Arc<Mutex<u8>>)
where
    Item: Clone + Send + 'static,
{
    let out_next = out.clone();
    let out_error = out.clone();
    let out_complete = out.clone();
    let sub = source.subscribe(
        move |item| {
            let _ = out_next.emit_next(item);
        },
        move |code| {
            let _ = out_error.emit_error(code);
        },
        move || {
            let mut left = remaining.lock();
            if *left > 0 {
                *left -= 1;
            }
            if *left == 0 {
                let _ = out_complete.emit_complete();
            }
        },
    );
    sub.request(u64::MAX);
}

/// Coalesce bursts of upstream items: each item replaces the previously
/// pending one and (re-)arms a one-shot timer at `now + interval`; when the
/// timer fires with nobody having superseded it, the pending item is
/// emitted. The last item in any quiet window wins.
pub fn debounce<Item>(source: &Stream<Item>, interval: Duration, event_loop: Arc<dyn EventLoop>) -> Stream<Item>
where
    Item: Clone + Send + 'static,
{
    struct Pending<Item> {
        item: Option<Item>,
        timer: Option<rt_adapters::RegistrationId>,
    }

    let out = Stream::<Item>::new();
    let pending: Arc<Mutex<Pending<Item>>> = Arc::new(Mutex::new(Pending { item: None, timer: None }));

    let out_next = out.clone();
    let out_error = out.clone();
    let out_complete = out.clone();
    let pending_for_next = pending.clone();
    let event_loop_for_next = event_loop;

    let sub = source.subscribe(
        move |item| {
            let mut state = pending_for_next.lock();
            if let Some(old_timer) = state.timer.take() {
                event_loop_for_next.unregister(old_timer);
            }
            state.item = Some(item);
            let fire_pending = pending_for_next.clone();
            let fire_out = out_next.clone();
            let id = event_loop_for_next.register_timer(
                Instant::now() + interval,
                None,
                Box::new(move || {
                    let fired = fire_pending.lock().item.take();
                    if let Some(item) = fired {
                        let _ = fire_out.emit_next(item);
                    }
                }),
            );
            state.timer = Some(id);
        },
        move |code| {
            let _ = out_error.emit_error(code);
        },
        move || {
            let _ = out_complete.emit_complete();
        },
    );
    sub.request(u64::MAX);
    out
}
