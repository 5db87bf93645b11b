//! Core error taxonomy for the voice gateway.
//!
//! This is the canonical error type shared by the engine and server crates.
//! Adapters map it onto their own surfaces (HTTP status codes, WebSocket
//! `error` frames).

use thiserror::Error;

/// Core error type for session-engine domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The session ID does not exist or is no longer active.
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// An event was enqueued after the session went inactive.
    #[error("queue closed for session {0}")]
    QueueClosed(String),

    /// The upstream service rejected the event sequence.
    #[error("upstream rejected event sequence: {0}")]
    UpstreamValidation(String),

    /// The upstream stream failed after being accepted.
    #[error("upstream stream error: {0}")]
    UpstreamTransient(String),

    /// A tool invocation failed.
    #[error("tool invocation failed: {0}")]
    ToolFailure(String),

    /// A tool name outside the supported set was requested.
    #[error("unsupported tool: {0}")]
    UnsupportedTool(String),

    /// The session was idle past the configured threshold.
    #[error("session idle timeout")]
    IdleTimeout,

    /// Ordered teardown did not complete within its budget.
    #[error("teardown timed out")]
    TeardownTimeout,

    /// Invalid input from the client.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unexpected internal condition.
    #[error("internal error: {0}")]
    Internal(String),
}
