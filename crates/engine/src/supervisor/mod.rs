// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fault-tolerance controller: a registry of child activities, a monitor
//! thread that reacts to their exits, and bounded-intensity restart logic.
//!
//! Children run on their own detached OS thread; the only channel back to
//! the supervisor is a single exit event carrying `(ChildId, generation,
//! exit_status)`. The supervisor never joins a child thread directly — it
//! only ever learns about an exit by receiving that message, which is also
//! why a child being swept into a restart by [`Strategy::OneForAll`] or
//! [`Strategy::RestForOne`] is told to stop cooperatively (its
//! [`CancelToken`] is set) rather than killed: nothing in safe Rust can
//! force a `std::thread` to stop.
//!
//! `generation` exists because restarting a still-running sibling doesn't
//! wait for its old thread to actually exit — it may report its own exit
//! later, on a channel the supervisor is still reading from for the
//! replacement. Tagging each spawn with a generation lets the monitor
//! recognize and discard that stale message instead of misreading it as the
//! replacement's exit.

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

use parking_lot::Mutex;
use rt_adapters::{Channel, RecvOutcome};
use rt_core::{
    ChildId, ChildMeta, ChildState, Clock, RestartPolicy, RtError, Strategy, SupervisorError, SupervisorId,
    SystemClock,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Cooperative stop signal handed to every child entry function. Setting it
/// is the supervisor's entire repertoire for stopping a child early — there
/// is no forced termination, only a best-effort cooperative stop.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A child activity as registered with [`add_child`](Supervisor::add_child).
///
/// `entry` is a factory rather than a one-shot closure: a restart calls it
/// again from scratch, so it must be callable more than once. It receives a
/// fresh [`CancelToken`] each spawn and returns an exit status (`0` for a
/// clean exit).
#[derive(Clone)]
pub struct ChildSpec {
    pub meta: ChildMeta,
    entry: Arc<dyn Fn(CancelToken) -> i32 + Send + Sync>,
}

impl ChildSpec {
    pub fn new(
        name: impl Into<String>,
        restart: RestartPolicy,
        entry: impl Fn(CancelToken) -> i32 + Send + Sync + 'static,
    ) -> Self {
        Self { meta: ChildMeta::new(name, restart), entry: Arc::new(entry) }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.meta = self.meta.with_shutdown_timeout(timeout);
        self
    }
}

/// `(child, generation, exit status)`.
type ExitMsg = (ChildId, u64, i32);

struct ChildRecord {
    id: ChildId,
    spec: ChildSpec,
    order: u64,
    state: ChildState,
    last_exit_status: Option<i32>,
    generation: u64,
    cancel: Option<CancelToken>,
    thread: Option<JoinHandle<()>>,
    restart_count: u32,
    first_restart_at: Option<Instant>,
}

struct Inner {
    strategy: Strategy,
    max_restarts: i64,
    window: Duration,
    children: Vec<ChildRecord>,
    next_order: u64,
    running: bool,
}

impl Inner {
    fn position(&self, id: ChildId) -> Option<usize> {
        self.children.iter().position(|c| c.id == id)
    }
}

/// A supervisor instance. Cloning shares the same underlying registry.
pub struct Supervisor<C: Clock = SystemClock> {
    id: SupervisorId,
    clock: C,
    inner: Arc<Mutex<Inner>>,
    exit_channel: Channel<ExitMsg>,
    monitor: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<C: Clock> Clone for Supervisor<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            clock: self.clock.clone(),
            inner: self.inner.clone(),
            exit_channel: self.exit_channel.clone(),
            monitor: self.monitor.clone(),
        }
    }
}

impl Supervisor<SystemClock> {
    pub fn new(strategy: Strategy, max_restarts: i64, window: Duration) -> Self {
        Self::with_clock(strategy, max_restarts, window, SystemClock)
    }
}

impl<C: Clock> Supervisor<C> {
    pub fn with_clock(strategy: Strategy, max_restarts: i64, window: Duration, clock: C) -> Self {
        Self {
            id: SupervisorId::new(),
            clock,
            inner: Arc::new(Mutex::new(Inner {
                strategy,
                max_restarts,
                window,
                children: Vec::new(),
                next_order: 0,
                running: false,
            })),
            exit_channel: Channel::unbounded(),
            monitor: Arc::new(Mutex::new(None)),
        }
    }

    pub fn id(&self) -> SupervisorId {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    pub fn child_count(&self) -> usize {
        self.inner.lock().children.len()
    }

    /// Register a child. If the supervisor is already running, it is
    /// spawned immediately; otherwise it stays `Init` until [`start`](Self::start).
    pub fn add_child(&self, spec: ChildSpec) -> ChildId {
        let id = ChildId::new();
        let mut inner = self.inner.lock();
        let order = inner.next_order;
        inner.next_order += 1;
        inner.children.push(ChildRecord {
            id,
            spec,
            order,
            state: ChildState::Init,
            last_exit_status: None,
            generation: 0,
            cancel: None,
            thread: None,
            restart_count: 0,
            first_restart_at: None,
        });
        if inner.running {
            let idx = inner.children.len() - 1;
            spawn_child(&mut inner, idx, &self.exit_channel, self.id);
        }
        tracing::info!(supervisor = %self.id, child = %id, "child added");
        id
    }

    /// Remove a child, cooperatively stopping it first if it is alive.
    pub fn remove_child(&self, id: ChildId) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock();
        let idx = inner.position(id).ok_or(SupervisorError::UnknownChild)?;
        stop_child(&mut inner.children[idx]);
        inner.children.remove(idx);
        Ok(())
    }

    /// Restart a child out-of-band (not triggered by its own exit). Subject
    /// to the same restart-intensity budget as an automatic restart; denial
    /// escalates exactly as the monitor loop would.
    pub fn restart_child(&self, id: ChildId) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock();
        if !inner.running {
            return Err(SupervisorError::NotRunning);
        }
        let idx = inner.position(id).ok_or(SupervisorError::UnknownChild)?;
        stop_child(&mut inner.children[idx]);
        let now = self.clock.now();
        if !can_restart(&mut inner.children[idx], inner.max_restarts, inner.window, now) {
            let restarts = inner.children[idx].restart_count;
            let max = inner.max_restarts.max(0) as u32;
            let window_ms = duration_ms(inner.window);
            escalate(&mut inner, &self.exit_channel, self.id);
            return Err(SupervisorError::Intensity(RtError::IntensityExceeded { restarts, max, window_ms }));
        }
        spawn_child(&mut inner, idx, &self.exit_channel, self.id);
        Ok(())
    }

    /// Start the supervisor: spawns every `Init` child and the monitor
    /// thread. A second call is a no-op.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        if inner.running {
            return;
        }
        inner.running = true;
        tracing::info!(supervisor = %self.id, children = inner.children.len(), "starting supervisor");
        for idx in 0..inner.children.len() {
            if inner.children[idx].state == ChildState::Init {
                spawn_child(&mut inner, idx, &self.exit_channel, self.id);
            }
        }
        drop(inner);

        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return;
        }
        let inner_shared = self.inner.clone();
        let exit_channel = self.exit_channel.clone();
        let clock = self.clock.clone();
        let id = self.id;
        let name = format!("rt-supervisor-{id}");
        let handle =
            std::thread::Builder::new().name(name).spawn(move || monitor_loop(inner_shared, exit_channel, clock, id)).expect("spawning the supervisor monitor thread");
        *monitor = Some(handle);
    }

    /// Stop the supervisor: cooperatively stops every child, closes the
    /// exit channel to wake the monitor, and joins it. A second call is a
    /// no-op.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if !inner.running {
            return;
        }
        inner.running = false;
        tracing::info!(supervisor = %self.id, "stopping supervisor");
        for child in inner.children.iter_mut() {
            stop_child(child);
        }
        drop(inner);
        self.exit_channel.close();
        if let Some(handle) = self.monitor.lock().take() {
            let _ = handle.join();
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// Cooperative stop: set the cancel flag (if the child is alive), then mark
/// it `Exited` unconditionally. No thread is joined here — this marks the
/// child exited without waiting to confirm the underlying thread has ended.
fn stop_child(child: &mut ChildRecord) {
    if let Some(cancel) = &child.cancel {
        cancel.cancel();
    }
    if child.state == ChildState::Running {
        child.state = ChildState::Stopping;
    }
    child.state = ChildState::Exited;
    child.thread = None;
}

fn spawn_child(inner: &mut Inner, idx: usize, exit_channel: &Channel<ExitMsg>, supervisor: SupervisorId) {
    let child = &mut inner.children[idx];
    child.generation += 1;
    let generation = child.generation;
    let cancel = CancelToken::default();
    child.cancel = Some(cancel.clone());
    child.state = ChildState::Running;
    child.last_exit_status = None;

    let id = child.id;
    let entry = child.spec.entry.clone();
    let exit_channel = exit_channel.clone();
    let name = format!("rt-supervisor-child-{id}");
    let handle = std::thread::Builder::new()
        .name(name)
        .spawn(move || {
            let status = entry(cancel);
            let _ = exit_channel.send((id, generation, status));
        })
        .expect("spawning a supervisor child thread");
    child.thread = Some(handle);
    tracing::debug!(supervisor = %supervisor, child = %id, generation, "child spawned");
}

/// Per-child sliding-window restart budget. Mutates `restart_count`/
/// `first_restart_at` as a side effect of checking, including on the
/// attempt that gets denied, so callers should only call this once per
/// restart decision.
fn can_restart(child: &mut ChildRecord, max_restarts: i64, window: Duration, now: Instant) -> bool {
    if max_restarts <= 0 {
        child.restart_count += 1;
        if child.first_restart_at.is_none() {
            child.first_restart_at = Some(now);
        }
        return true;
    }
    let max_restarts = max_restarts as u32;
    match child.first_restart_at {
        None => {
            child.restart_count = 1;
            child.first_restart_at = Some(now);
            true
        }
        Some(first) if now.saturating_duration_since(first) > window => {
            child.restart_count = 1;
            child.first_restart_at = Some(now);
            true
        }
        Some(_) => {
            if child.restart_count + 1 > max_restarts {
                false
            } else {
                child.restart_count += 1;
                true
            }
        }
    }
}

/// Whether `child` (at `target_idx`) should be restarted, given that
/// `failed_idx` is the child whose exit triggered this pass with `status`.
/// The failed child's own `Transient` policy checks its exit status; every
/// other child swept in by `OneForAll`/`RestForOne` restarts unconditionally
/// unless `Temporary` — it isn't being judged on its own exit, it's being
/// torn down and rebuilt because a sibling failed.
fn should_restart(child: &ChildRecord, target_idx: usize, failed_idx: usize, status: i32) -> bool {
    match child.spec.meta.restart {
        RestartPolicy::Permanent => true,
        RestartPolicy::Temporary => false,
        RestartPolicy::Transient => target_idx != failed_idx || status != 0,
    }
}

fn chosen_set(inner: &Inner, failed_idx: usize, status: i32) -> Vec<usize> {
    if status == 0 {
        return vec![failed_idx];
    }
    match inner.strategy {
        Strategy::OneForOne => vec![failed_idx],
        Strategy::OneForAll => (0..inner.children.len()).collect(),
        Strategy::RestForOne => {
            let order = inner.children[failed_idx].order;
            inner.children.iter().enumerate().filter(|(_, c)| c.order >= order).map(|(i, _)| i).collect()
        }
    }
}

/// Stop every child and mark the supervisor not-running. Does not close the
/// exit channel itself — callers already hold a path to do that (the
/// monitor closes it directly; [`Supervisor::stop`] closes it after
/// dropping the lock).
fn escalate(inner: &mut Inner, exit_channel: &Channel<ExitMsg>, supervisor: SupervisorId) {
    tracing::error!(supervisor = %supervisor, "restart intensity exceeded, escalating");
    for child in inner.children.iter_mut() {
        stop_child(child);
    }
    inner.running = false;
    exit_channel.close();
}

fn handle_exit(
    inner: &mut Inner,
    clock: &impl Clock,
    supervisor: SupervisorId,
    exit_channel: &Channel<ExitMsg>,
    child_id: ChildId,
    generation: u64,
    status: i32,
) {
    let Some(failed_idx) = inner.position(child_id) else {
        tracing::warn!(supervisor = %supervisor, child = %child_id, "exit event for unknown child ignored");
        return;
    };
    if inner.children[failed_idx].generation != generation {
        tracing::debug!(supervisor = %supervisor, child = %child_id, "stale exit event from a superseded generation ignored");
        return;
    }

    inner.children[failed_idx].state = ChildState::Exited;
    inner.children[failed_idx].last_exit_status = Some(status);
    inner.children[failed_idx].thread = None;
    tracing::info!(supervisor = %supervisor, child = %child_id, status, "child exited");

    let chosen = chosen_set(inner, failed_idx, status);
    for &idx in &chosen {
        stop_child(&mut inner.children[idx]);
    }

    let to_restart: Vec<usize> =
        chosen.iter().copied().filter(|&idx| should_restart(&inner.children[idx], idx, failed_idx, status)).collect();

    let now = clock.now();
    for &idx in &to_restart {
        if !can_restart(&mut inner.children[idx], inner.max_restarts, inner.window, now) {
            escalate(inner, exit_channel, supervisor);
            return;
        }
    }
    for &idx in &to_restart {
        spawn_child(inner, idx, exit_channel, supervisor);
    }
}

fn monitor_loop<C: Clock>(inner: Arc<Mutex<Inner>>, exit_channel: Channel<ExitMsg>, clock: C, supervisor: SupervisorId) {
    loop {
        match exit_channel.recv_deadline(None) {
            RecvOutcome::Closed => return,
            RecvOutcome::TimedOut => continue,
            RecvOutcome::Got((child_id, generation, status)) => {
                let mut inner = inner.lock();
                if !inner.running {
                    continue;
                }
                handle_exit(&mut inner, &clock, supervisor, &exit_channel, child_id, generation, status);
            }
        }
    }
}
