// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Agent error types.
//!
//! `Unauthorized` and `MissingDependency` are fatal: the agent exits
//! non-zero instead of retrying. Everything else is transient and handled
//! by the reconnect / poll loops.

use thiserror::Error;

/// Result type using AgentError
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that can occur while the agent runs.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("unauthorized: the server rejected this agent's token")]
    Unauthorized,

    #[error("required dependency not available: {0}")]
    MissingDependency(&'static str),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("frame error: {0}")]
    Frame(#[from] horizonx_protocol::FrameError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("job execution timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Fatal errors stop the agent process entirely.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::MissingDependency(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AgentError::Unauthorized.is_fatal());
        assert!(AgentError::MissingDependency("git").is_fatal());
        assert!(!AgentError::Timeout.is_fatal());
        assert!(!AgentError::CommandFailed("exit 1".to_string()).is_fatal());
    }
}
