// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Agent bearer credentials.
//!
//! Agents authenticate with `Authorization: Bearer <server_uuid>.<secret>`.
//! The server id travels in the clear so the control plane can look up the
//! stored hash; the secret is only ever compared against that hash. Binding
//! the id into the tuple means a secret lifted from one server cannot be
//! replayed against another.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Errors produced while parsing agent credentials.
#[derive(Debug, Error, PartialEq)]
pub enum CredentialsError {
    #[error("missing bearer scheme")]
    MissingScheme,

    #[error("malformed credentials: expected <server_uuid>.<secret>")]
    Malformed,

    #[error("invalid server id: {0}")]
    InvalidServerId(String),
}

/// Parsed `<server_uuid>.<secret>` credential pair.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentCredentials {
    pub server_id: Uuid,
    pub secret: String,
}

impl AgentCredentials {
    pub fn new(server_id: Uuid, secret: impl Into<String>) -> Self {
        Self {
            server_id,
            secret: secret.into(),
        }
    }

    /// Parse credentials from a full `Authorization` header value.
    pub fn from_authorization_header(value: &str) -> Result<Self, CredentialsError> {
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(CredentialsError::MissingScheme)?;
        token.parse()
    }

    /// Render the value for an `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self)
    }
}

impl FromStr for AgentCredentials {
    type Err = CredentialsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, secret) = s.split_once('.').ok_or(CredentialsError::Malformed)?;
        if secret.is_empty() {
            return Err(CredentialsError::Malformed);
        }
        let server_id =
            Uuid::parse_str(id).map_err(|_| CredentialsError::InvalidServerId(id.to_string()))?;
        Ok(Self {
            server_id,
            secret: secret.to_string(),
        })
    }
}

impl fmt::Display for AgentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.server_id, self.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let id = Uuid::new_v4();
        let creds = AgentCredentials::new(id, "s3cr3t");
        let parsed: AgentCredentials = creds.to_string().parse().unwrap();
        assert_eq!(parsed, creds);
    }

    #[test]
    fn test_from_authorization_header() {
        let id = Uuid::new_v4();
        let header = format!("Bearer {}.topsecret", id);
        let creds = AgentCredentials::from_authorization_header(&header).unwrap();
        assert_eq!(creds.server_id, id);
        assert_eq!(creds.secret, "topsecret");
    }

    #[test]
    fn test_missing_scheme() {
        let err = AgentCredentials::from_authorization_header("Basic abc").unwrap_err();
        assert_eq!(err, CredentialsError::MissingScheme);
    }

    #[test]
    fn test_malformed_without_separator() {
        let err = "no-separator-here".parse::<AgentCredentials>().unwrap_err();
        assert_eq!(err, CredentialsError::Malformed);
    }

    #[test]
    fn test_empty_secret_rejected() {
        let raw = format!("{}.", Uuid::new_v4());
        assert_eq!(
            raw.parse::<AgentCredentials>().unwrap_err(),
            CredentialsError::Malformed
        );
    }

    #[test]
    fn test_invalid_uuid_rejected() {
        let err = "not-a-uuid.secret".parse::<AgentCredentials>().unwrap_err();
        assert!(matches!(err, CredentialsError::InvalidServerId(_)));
    }

    #[test]
    fn test_secret_may_contain_dots() {
        let id = Uuid::new_v4();
        let raw = format!("{}.a.b.c", id);
        let creds: AgentCredentials = raw.parse().unwrap();
        assert_eq!(creds.secret, "a.b.c");
    }
}
