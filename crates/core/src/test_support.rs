// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::coroutine::CoroutineState;
    use crate::stream::StreamState;
    use crate::supervisor::{ChildState, RestartPolicy, Strategy as SupervisorStrategy};
    use proptest::prelude::*;

    pub fn arb_coroutine_state() -> impl Strategy<Value = CoroutineState> {
        prop_oneof![
            Just(CoroutineState::New),
            Just(CoroutineState::Ready),
            Just(CoroutineState::Running),
            Just(CoroutineState::Done),
            Just(CoroutineState::Canceled),
        ]
    }

    pub fn arb_stream_state() -> impl Strategy<Value = StreamState> {
        prop_oneof![
            Just(StreamState::Pending),
            any::<i32>().prop_map(StreamState::Error),
            Just(StreamState::Completed),
        ]
    }

    pub fn arb_child_state() -> impl Strategy<Value = ChildState> {
        prop_oneof![
            Just(ChildState::Init),
            Just(ChildState::Running),
            Just(ChildState::Stopping),
            Just(ChildState::Exited),
        ]
    }

    pub fn arb_restart_policy() -> impl Strategy<Value = RestartPolicy> {
        prop_oneof![
            Just(RestartPolicy::Permanent),
            Just(RestartPolicy::Transient),
            Just(RestartPolicy::Temporary),
        ]
    }

    pub fn arb_strategy() -> impl Strategy<Value = SupervisorStrategy> {
        prop_oneof![
            Just(SupervisorStrategy::OneForOne),
            Just(SupervisorStrategy::OneForAll),
            Just(SupervisorStrategy::RestForOne),
        ]
    }
}
