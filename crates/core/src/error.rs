// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types shared by every subsystem.
//!
//! Each subsystem has its own error enum for the failure modes specific to
//! it; all of them convert into [`RtError`] so callers that don't care which
//! subsystem failed can propagate a single type with `?`.

use thiserror::Error;

/// Top-level error kind, shared across coroutines, streams, dataflow, and
/// the supervisor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RtError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("state violation: {0}")]
    StateViolation(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("channel closed")]
    ChannelClosed,

    #[error("operation timed out")]
    Timeout,

    #[error("restart intensity exceeded: {restarts} restarts within {window_ms}ms (max {max})")]
    IntensityExceeded { restarts: u32, max: u32, window_ms: u64 },
}

impl RtError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn state_violation(msg: impl Into<String>) -> Self {
        Self::StateViolation(msg.into())
    }
}

/// Errors specific to coroutine operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoroutineError {
    #[error("coroutine is not alive")]
    NotAlive,

    #[error("coroutine is already terminal")]
    AlreadyTerminal,

    #[error(transparent)]
    Other(#[from] RtError),
}

/// Errors specific to stream operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream is already terminal")]
    AlreadyTerminal,

    #[error("subscription is unsubscribed")]
    Unsubscribed,

    #[error(transparent)]
    Other(#[from] RtError),
}

/// Errors specific to dataflow graph operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataflowError {
    #[error("port index {port} out of range (node has {num_ports} ports)")]
    PortOutOfRange { port: usize, num_ports: usize },

    #[error("node still has outbound edges, cannot remove")]
    NodeHasOutboundEdges,

    #[error("edge inbox is closed")]
    EdgeClosed,

    #[error("graph is not running")]
    NotRunning,

    #[error(transparent)]
    Other(#[from] RtError),
}

/// Errors specific to supervisor operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("unknown child id")]
    UnknownChild,

    #[error("supervisor is not running")]
    NotRunning,

    #[error(transparent)]
    Intensity(#[from] RtError),
}

pub type RtResult<T> = Result<T, RtError>;
