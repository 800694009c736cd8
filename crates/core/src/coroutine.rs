// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity and state-machine types for cooperative coroutines.
//!
//! The coroutine runtime itself (the trampoline, the resume/yield payload
//! protocol) lives in `rt-engine`; this module only holds the identity and
//! the state enum so that both the engine and any adapter can agree on them
//! without a dependency cycle.

crate::define_id! {
    /// Identifies a single spawned coroutine.
    pub struct CoroutineId("coro");
}

/// Lifecycle state of a coroutine.
///
/// Progresses `New -> Ready -> Running <-> Ready -> Done`, with `Canceled`
/// reachable from any non-terminal state once cancellation is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoroutineState {
    /// Created but not yet handed to the scheduler.
    New,
    /// Suspended, waiting to be resumed.
    Ready,
    /// Currently executing on its green thread.
    Running,
    /// Finished normally; a result is available.
    Done,
    /// Finished due to cancellation; no result is available.
    Canceled,
}

impl CoroutineState {
    /// A terminal state accepts no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, CoroutineState::Done | CoroutineState::Canceled)
    }

    pub fn is_alive(self) -> bool {
        !self.is_terminal()
    }
}

crate::simple_display! {
    CoroutineState {
        New => "new",
        Ready => "ready",
        Running => "running",
        Done => "done",
        Canceled => "canceled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(CoroutineState::Done.is_terminal());
        assert!(CoroutineState::Canceled.is_terminal());
        assert!(!CoroutineState::Running.is_terminal());
        assert!(!CoroutineState::New.is_terminal());
        assert!(!CoroutineState::Ready.is_terminal());
    }

    #[test]
    fn alive_is_the_negation_of_terminal() {
        for state in [
            CoroutineState::New,
            CoroutineState::Ready,
            CoroutineState::Running,
            CoroutineState::Done,
            CoroutineState::Canceled,
        ] {
            assert_eq!(state.is_alive(), !state.is_terminal());
        }
    }

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = CoroutineId::new();
        let b = CoroutineId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(CoroutineId::PREFIX));
    }

    mod properties {
        use super::*;
        use crate::test_support::strategies::arb_coroutine_state;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn alive_is_always_the_negation_of_terminal(state in arb_coroutine_state()) {
                prop_assert_eq!(state.is_alive(), !state.is_terminal());
            }
        }
    }
}
