// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-loop-backed sources. Both emit a null sentinel (`()`) per fire,
//! since these sources carry no payload of their own.

use super::Stream;
use parking_lot::Mutex;
use rt_adapters::{EventLoop, FdSource, IoMask};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A periodic (or one-shot, if `count == 1`) timer. Fires `count` times
/// total, then completes and unregisters itself.
pub fn timer(event_loop: Arc<dyn EventLoop>, period: Duration, count: u64) -> Stream<()> {
    let out = Stream::<()>::new();
    if count == 0 {
        let _ = out.emit_complete();
        return out;
    }

    let remaining = Arc::new(Mutex::new(count));
    let registration: Arc<Mutex<Option<rt_adapters::RegistrationId>>> = Arc::new(Mutex::new(None));
    let periodic = count > 1;

    let out_fire = out.clone();
    let remaining_fire = remaining.clone();
    let registration_fire = registration.clone();
    let event_loop_fire = event_loop.clone();

    let callback: Box<dyn FnMut() + Send> = Box::new(move || {
        let mut left = remaining_fire.lock();
        if *left == 0 {
            return;
        }
        *left -= 1;
        let exhausted = *left == 0;
        drop(left);
        let _ = out_fire.emit_next(());
        if exhausted {
            let _ = out_fire.emit_complete();
            if let Some(id) = registration_fire.lock().take() {
                event_loop_fire.unregister(id);
            }
        }
    });

    let period_arg = if periodic { Some(period) } else { None };
    let id = event_loop.register_timer(Instant::now() + period, period_arg, callback);
    *registration.lock() = Some(id);
    out
}

/// Emits a null sentinel on every readiness event from `source` matching
/// `mask`. Runs until the process exits or the underlying event loop is
/// dropped; there is no separate stop operation for a raw fd source.
pub fn from_fd(event_loop: Arc<dyn EventLoop>, source: Arc<dyn FdSource>, mask: IoMask) -> Stream<()> {
    let out = Stream::<()>::new();
    let out_fire = out.clone();
    let callback: Box<dyn FnMut() + Send> = Box::new(move || {
        let _ = out_fire.emit_next(());
    });
    event_loop.register_io(source, mask, callback);
    out
}
