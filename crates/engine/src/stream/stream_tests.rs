// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::operators::{debounce, filter, map, merge, take};
use super::sources::timer;
use super::*;
use rt_adapters::ReactorEventLoop;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

/// Seed scenario 2: stream backpressure.
#[test]
fn backpressure_buffers_until_demand_then_drains_in_order() {
    let stream = Stream::<&'static str>::new();
    let received = Arc::new(StdMutex::new(Vec::new()));
    let completed = Arc::new(AtomicUsize::new(0));

    let received_cb = received.clone();
    let completed_cb = completed.clone();
    let sub = stream.subscribe(
        move |item| received_cb.lock().unwrap().push(item),
        |_code| {},
        move || {
            completed_cb.fetch_add(1, Ordering::SeqCst);
        },
    );

    stream.emit_next("a").unwrap();
    stream.emit_next("b").unwrap();
    stream.emit_next("c").unwrap();
    assert!(received.lock().unwrap().is_empty(), "nothing delivered before any demand");

    sub.request(2);
    assert_eq!(*received.lock().unwrap(), vec!["a", "b"]);

    stream.emit_complete().unwrap();
    assert_eq!(completed.load(Ordering::SeqCst), 1);
    // "c" stayed buffered and was dropped (in Rust: simply never cloned out
    // anywhere else) when emit_complete cleared the buffer.
    assert_eq!(*received.lock().unwrap(), vec!["a", "b"]);
}

/// Seed scenario 4: take.
#[test]
fn take_forwards_n_then_completes() {
    let source = Stream::<i32>::new();
    let taken = take(&source, 2);

    let received = Arc::new(StdMutex::new(Vec::new()));
    let completed = Arc::new(AtomicUsize::new(0));
    let received_cb = received.clone();
    let completed_cb = completed.clone();
    let sub = taken.subscribe(
        move |item| received_cb.lock().unwrap().push(item),
        |_code| {},
        move || {
            completed_cb.fetch_add(1, Ordering::SeqCst);
        },
    );
    sub.request(10);

    for item in [10, 20, 30, 40] {
        source.emit_next(item).unwrap();
    }

    assert_eq!(*received.lock().unwrap(), vec![10, 20]);
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}

/// Seed scenario 3: debounce.
#[test]
fn debounce_coalesces_a_burst_to_the_last_item() {
    let event_loop: Arc<dyn rt_adapters::EventLoop> = Arc::new(ReactorEventLoop::new());
    let source = Stream::<i32>::new();
    let debounced = debounce(&source, Duration::from_millis(50), event_loop);

    let received = Arc::new(StdMutex::new(Vec::new()));
    let received_cb = received.clone();
    let sub = debounced.subscribe(move |item| received_cb.lock().unwrap().push(item), |_| {}, || {});
    sub.request(u64::MAX);

    for item in [1, 2, 3] {
        source.emit_next(item).unwrap();
        std::thread::sleep(Duration::from_millis(3));
    }

    std::thread::sleep(Duration::from_millis(120));
    assert_eq!(*received.lock().unwrap(), vec![3]);
}

/// Same scenario as above, but driven by a virtual clock instead of real
/// sleeps: each burst item re-arms the timer, and only advancing past the
/// quiet interval lets the last one through.
#[test]
fn debounce_coalesces_a_burst_deterministically_under_a_manual_clock() {
    let event_loop = Arc::new(rt_adapters::ManualEventLoop::new());
    let source = Stream::<i32>::new();
    let debounced = debounce(&source, Duration::from_millis(50), event_loop.clone() as Arc<dyn rt_adapters::EventLoop>);

    let received = Arc::new(StdMutex::new(Vec::new()));
    let received_cb = received.clone();
    let sub = debounced.subscribe(move |item| received_cb.lock().unwrap().push(item), |_| {}, || {});
    sub.request(u64::MAX);

    source.emit_next(1).unwrap();
    event_loop.advance(Duration::from_millis(20));
    source.emit_next(2).unwrap();
    event_loop.advance(Duration::from_millis(20));
    source.emit_next(3).unwrap();
    assert!(received.lock().unwrap().is_empty(), "each new item re-arms the timer before it fires");

    event_loop.advance(Duration::from_millis(50));
    assert_eq!(*received.lock().unwrap(), vec![3]);
}

#[test]
fn map_transforms_each_item() {
    let source = Stream::<i32>::new();
    let doubled = map(&source, |x| x * 2);
    let received = Arc::new(StdMutex::new(Vec::new()));
    let received_cb = received.clone();
    let sub = doubled.subscribe(move |item| received_cb.lock().unwrap().push(item), |_| {}, || {});
    sub.request(u64::MAX);
    source.emit_next(21).unwrap();
    assert_eq!(*received.lock().unwrap(), vec![42]);
}

#[test]
fn filter_drops_items_failing_the_predicate() {
    let source = Stream::<i32>::new();
    let evens = filter(&source, |x| x % 2 == 0);
    let received = Arc::new(StdMutex::new(Vec::new()));
    let received_cb = received.clone();
    let sub = evens.subscribe(move |item| received_cb.lock().unwrap().push(item), |_| {}, || {});
    sub.request(u64::MAX);
    for item in [1, 2, 3, 4] {
        source.emit_next(item).unwrap();
    }
    assert_eq!(*received.lock().unwrap(), vec![2, 4]);
}

#[test]
fn merge_forwards_from_either_source_and_completes_once_both_do() {
    let a = Stream::<i32>::new();
    let b = Stream::<i32>::new();
    let merged = merge(&a, &b);
    let received = Arc::new(StdMutex::new(Vec::new()));
    let completed = Arc::new(AtomicUsize::new(0));
    let received_cb = received.clone();
    let completed_cb = completed.clone();
    let sub = merged.subscribe(
        move |item| received_cb.lock().unwrap().push(item),
        |_| {},
        move || {
            completed_cb.fetch_add(1, Ordering::SeqCst);
        },
    );
    sub.request(u64::MAX);

    a.emit_next(1).unwrap();
    b.emit_next(2).unwrap();
    a.emit_complete().unwrap();
    assert_eq!(completed.load(Ordering::SeqCst), 0, "not done until both sources complete");
    b.emit_complete().unwrap();
    assert_eq!(completed.load(Ordering::SeqCst), 1);

    let mut sorted = received.lock().unwrap().clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![1, 2]);
}

#[test]
fn subscribing_to_an_already_completed_stream_fires_complete_synchronously() {
    let stream = Stream::<i32>::new();
    stream.emit_complete().unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_cb = fired.clone();
    let _sub = stream.subscribe(|_| {}, |_| {}, move || {
        fired_cb.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn unsubscribing_twice_is_idempotent() {
    let stream = Stream::<i32>::new();
    let sub = stream.subscribe(|_| {}, |_| {}, || {});
    sub.unsubscribe();
    sub.unsubscribe();
    assert!(sub.is_unsubscribed());
}

#[test]
fn timer_source_fires_count_times_then_completes() {
    let event_loop: Arc<dyn rt_adapters::EventLoop> = Arc::new(ReactorEventLoop::new());
    let ticks = timer(event_loop, Duration::from_millis(10), 3);
    let count = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let count_cb = count.clone();
    let completed_cb = completed.clone();
    let sub = ticks.subscribe(
        move |_| {
            count_cb.fetch_add(1, Ordering::SeqCst);
        },
        |_| {},
        move || {
            completed_cb.fetch_add(1, Ordering::SeqCst);
        },
    );
    sub.request(u64::MAX);
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}
