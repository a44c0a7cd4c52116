// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Agent configuration from environment variables.

use std::path::PathBuf;

use uuid::Uuid;

use horizonx_protocol::AgentCredentials;

/// Agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Control plane HTTP base URL
    pub api_url: String,
    /// Control plane WebSocket URL (agent endpoint)
    pub ws_url: String,
    /// This server's id, as issued at registration
    pub server_id: Uuid,
    /// This server's plaintext API token
    pub api_token: String,
    /// Working directory holding per-application checkouts
    pub work_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `HORIZONX_SERVER_ID`: server UUID issued at registration
    /// - `HORIZONX_SERVER_API_TOKEN`: plaintext API token
    ///
    /// Optional (with defaults):
    /// - `HORIZONX_API_URL`: HTTP base URL (default: `http://localhost:3000`)
    /// - `HORIZONX_WS_URL`: WebSocket URL (default: `ws://localhost:3000/ws/agent`)
    /// - `HORIZONX_WORK_DIR`: checkout directory (default: `/var/lib/horizonx`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_id: Uuid = std::env::var("HORIZONX_SERVER_ID")
            .map_err(|_| ConfigError::Missing("HORIZONX_SERVER_ID"))?
            .parse()
            .map_err(|_| ConfigError::Invalid("HORIZONX_SERVER_ID", "must be a UUID"))?;

        let api_token = std::env::var("HORIZONX_SERVER_API_TOKEN")
            .map_err(|_| ConfigError::Missing("HORIZONX_SERVER_API_TOKEN"))?;
        if api_token.is_empty() {
            return Err(ConfigError::Invalid(
                "HORIZONX_SERVER_API_TOKEN",
                "must not be empty",
            ));
        }

        let api_url = std::env::var("HORIZONX_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let ws_url = std::env::var("HORIZONX_WS_URL")
            .unwrap_or_else(|_| "ws://localhost:3000/ws/agent".to_string());

        let work_dir = PathBuf::from(
            std::env::var("HORIZONX_WORK_DIR")
                .unwrap_or_else(|_| "/var/lib/horizonx".to_string()),
        );

        Ok(Self {
            api_url,
            ws_url,
            server_id,
            api_token,
            work_dir,
        })
    }

    /// Bearer credentials for both the HTTP and WebSocket surfaces.
    pub fn credentials(&self) -> AgentCredentials {
        AgentCredentials::new(self.server_id, self.api_token.clone())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
