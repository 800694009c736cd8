// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The green-thread substrate the coroutine runtime is built on.
//!
//! A real stackful-coroutine backend (stack allocation, assembly context
//! switch) is out of scope given this workspace's lints
//! (`unsafe_code = "forbid"`); the safe substitute is one dedicated OS
//! thread per coroutine. `rt-engine::coroutine` builds the actual
//! resume/yield rendezvous (the cooperative part) on top of this; all this
//! trait provides is "run this body on a fresh kernel thread" and "wait for
//! it to finish".

use std::io;
use std::thread::JoinHandle;

/// Spawns and joins the OS thread that backs a single coroutine.
///
/// This is intentionally the entire external contract: everything about
/// resume/yield payload exchange, cancellation observation, and state
/// transitions is implemented by `rt-engine` on top of whatever thread this
/// produces. A backend only needs to be able to start a thread and wait for
/// it.
pub trait GreenThreadBackend: Send + Sync + 'static {
    /// Start `body` running on a new kernel thread. `stack_size` overrides
    /// the backend's default for this one thread when `Some`. Returns
    /// `Err` if the thread could not be created.
    fn spawn(
        &self,
        name: Option<String>,
        stack_size: Option<usize>,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>>;
}

/// Default backend: `std::thread` with a configurable stack size.
#[derive(Debug, Clone, Copy)]
pub struct StdThreadBackend {
    stack_size: Option<usize>,
}

impl StdThreadBackend {
    pub fn new() -> Self {
        Self { stack_size: None }
    }

    pub fn with_stack_size(stack_size: usize) -> Self {
        Self { stack_size: Some(stack_size) }
    }
}

impl Default for StdThreadBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GreenThreadBackend for StdThreadBackend {
    fn spawn(
        &self,
        name: Option<String>,
        stack_size: Option<usize>,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>> {
        let mut builder = std::thread::Builder::new();
        if let Some(name) = name {
            builder = builder.name(name);
        }
        if let Some(stack_size) = stack_size.or(self.stack_size) {
            builder = builder.stack_size(stack_size);
        }
        builder.spawn(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn spawn_runs_body_on_another_thread() {
        let backend = StdThreadBackend::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        let handle = backend
            .spawn(Some("rt-test".into()), None, Box::new(move || ran2.store(true, Ordering::SeqCst)))
            .expect("spawn should succeed");
        handle.join().expect("join should succeed");
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn stack_size_is_configurable() {
        let backend = StdThreadBackend::with_stack_size(64 * 1024);
        let handle = backend.spawn(None, None, Box::new(|| {})).expect("spawn should succeed");
        handle.join().expect("join should succeed");

        let backend = StdThreadBackend::new();
        let handle = backend.spawn(None, Some(64 * 1024), Box::new(|| {})).expect("spawn should succeed");
        handle.join().expect("join should succeed");
    }
}
