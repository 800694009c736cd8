// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity and state-machine types for reactive streams and subscriptions.

crate::define_id! {
    /// Identifies a stream (a source or an operator node).
    pub struct StreamId("strm");
}

crate::define_id! {
    /// Identifies a single subscription to a stream.
    pub struct SubscriptionId("subs");
}

/// Lifecycle state of a stream.
///
/// `Pending` is the only non-terminal state; once a stream transitions to
/// `Error` or `Completed` it stays there forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Accepting and delivering items normally.
    Pending,
    /// Terminated with an error code; no further items are delivered.
    Error(i32),
    /// Terminated normally; no further items are delivered.
    Completed,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamState::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!StreamState::Pending.is_terminal());
        assert!(StreamState::Error(1).is_terminal());
        assert!(StreamState::Completed.is_terminal());
    }

    #[test]
    fn ids_carry_distinct_prefixes() {
        let s = StreamId::new();
        let sub = SubscriptionId::new();
        assert!(s.as_str().starts_with(StreamId::PREFIX));
        assert!(sub.as_str().starts_with(SubscriptionId::PREFIX));
    }

    mod properties {
        use super::*;
        use crate::test_support::strategies::arb_stream_state;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn only_pending_is_ever_non_terminal(state in arb_stream_state()) {
                prop_assert_eq!(state.is_terminal(), !matches!(state, StreamState::Pending));
            }
        }
    }
}
