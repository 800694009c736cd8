// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rt-core: shared identity, state-machine, and error types for the
//! coroutine / stream / dataflow / supervisor runtime.
//!
//! This crate holds only data — no scheduling logic. `rt-engine` owns the
//! behavior; `rt-adapters` owns the external collaborators (green threads,
//! channels, the event loop) that the engine is generic over.

pub mod macros;

pub mod clock;
pub mod coroutine;
pub mod dataflow;
pub mod error;
pub mod id;
pub mod stream;
pub mod supervisor;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use coroutine::{CoroutineId, CoroutineState};
pub use dataflow::{EdgeId, GraphId, NodeId, PortIndex};
pub use error::{CoroutineError, DataflowError, RtError, RtResult, StreamError, SupervisorError};
pub use id::{short, IdBuf};
pub use stream::{StreamId, StreamState, SubscriptionId};
pub use supervisor::{ChildId, ChildMeta, ChildState, RestartPolicy, Strategy, SupervisorId};
