// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use chrono_tz::Tz;

/// Control plane configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP/WebSocket server binds to
    pub http_addr: SocketAddr,
    /// Origins allowed to open user WebSocket sessions
    pub allowed_origins: Vec<String>,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Secret for signing user session tokens
    pub jwt_secret: String,
    /// Lifetime of user session tokens
    pub jwt_expiry: Duration,
    /// Time zone used by the daily scheduler
    pub time_zone: Tz,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`: PostgreSQL connection string
    /// - `JWT_SECRET`: session token signing secret
    ///
    /// Optional (with defaults):
    /// - `HTTP_ADDR`: bind address (default: `0.0.0.0:3000`)
    /// - `ALLOWED_ORIGINS`: comma-separated origin allow-list (default: empty)
    /// - `JWT_EXPIRY`: token lifetime in seconds (default: 86400)
    /// - `TIME_ZONE`: IANA zone for daily workers (default: `UTC`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let http_addr: SocketAddr = std::env::var("HTTP_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_ADDR", "must be a socket address"))?;

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let jwt_expiry_secs: u64 = std::env::var("JWT_EXPIRY")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("JWT_EXPIRY", "must be a number of seconds"))?;

        let time_zone: Tz = std::env::var("TIME_ZONE")
            .unwrap_or_else(|_| "UTC".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("TIME_ZONE", "must be an IANA time zone"))?;

        Ok(Self {
            http_addr,
            allowed_origins,
            database_url,
            jwt_secret,
            jwt_expiry: Duration::from_secs(jwt_expiry_secs),
            time_zone,
        })
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
