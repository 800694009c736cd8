// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rt-engine: the four L1/L2 subsystems built on the `rt-adapters` external
//! collaborators — cooperative coroutines, push-based reactive streams, the
//! dataflow graph and its worker pool, and the supervisor.

pub mod coroutine;
pub mod dataflow;
pub mod stream;
pub mod supervisor;

pub use coroutine::{Coroutine, CoroutineOutcome, Scheduler};
pub use dataflow::{Emit, Graph, Touched};
pub use stream::{Stream, Subscription};
pub use supervisor::{CancelToken, ChildSpec, Supervisor};
