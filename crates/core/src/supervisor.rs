// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity, policy, and state-machine types for the supervisor.

use std::time::Duration;

crate::define_id! {
    /// Identifies a supervisor instance.
    pub struct SupervisorId("supv");
}

crate::define_id! {
    /// Identifies a child registered with a supervisor. Never reused.
    pub struct ChildId("chld");
}

/// What to do when a child exits, keyed off its own exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestartPolicy {
    /// Always restart, regardless of exit status.
    Permanent,
    /// Restart only if the exit status indicated failure (non-zero).
    Transient,
    /// Never restart.
    Temporary,
}

crate::simple_display! {
    RestartPolicy {
        Permanent => "permanent",
        Transient => "transient",
        Temporary => "temporary",
    }
}

/// Which siblings are considered for restart when one child fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Only the failed child is considered.
    OneForOne,
    /// Every child is considered.
    OneForAll,
    /// The failed child plus every child inserted after it.
    RestForOne,
}

crate::simple_display! {
    Strategy {
        OneForOne => "one_for_one",
        OneForAll => "one_for_all",
        RestForOne => "rest_for_one",
    }
}

/// Lifecycle state of a single child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildState {
    /// Registered but not yet spawned (supervisor not running at add time).
    Init,
    /// Spawned and executing.
    Running,
    /// Cooperative stop has been requested.
    Stopping,
    /// Exited; `last_exit_status` holds the observed status.
    Exited,
}

crate::simple_display! {
    ChildState {
        Init => "init",
        Running => "running",
        Stopping => "stopping",
        Exited => "exited",
    }
}

/// A child specification as handed to `add_child`.
///
/// `entry`/`arg` are not stored here — they live in the engine's
/// `ChildSpec<F>` (the entry is a capability, not serializable data); this
/// type carries only the policy metadata the supervisor itself reasons
/// about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildMeta {
    pub name: String,
    pub restart: RestartPolicy,
    pub shutdown_timeout: Option<Duration>,
}

impl ChildMeta {
    pub fn new(name: impl Into<String>, restart: RestartPolicy) -> Self {
        Self { name: name.into(), restart, shutdown_timeout: None }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }
}
