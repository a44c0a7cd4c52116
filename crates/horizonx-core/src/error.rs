// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the control plane.
//!
//! Provides a unified error type that the transport layer maps onto HTTP
//! status codes and the response envelope.

use std::collections::BTreeMap;
use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Control plane errors that can occur during request processing.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// Input failed validation; maps to 400 with a field → message map.
    Validation {
        /// Per-field validation messages.
        errors: BTreeMap<String, String>,
    },

    /// An entity does not exist or is soft-deleted; maps to 404.
    NotFound {
        /// What was looked up ("server", "job", ...).
        entity: &'static str,
    },

    /// Missing, malformed, or expired credentials; maps to 401.
    Unauthorized,

    /// Unique-constraint violation; maps to 400 with the sentinel message.
    Conflict {
        /// What collided ("email", ...).
        what: &'static str,
    },

    /// Database operation failed.
    Database {
        /// The operation that failed.
        operation: &'static str,
        /// Error details.
        details: String,
    },

    /// Payload (de)serialization failed.
    Serialization {
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Single-field validation error shorthand.
    pub fn validation(field: &str, message: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), message.to_string());
        Self::Validation { errors }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Conflict { .. } => "CONFLICT",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Serialization { .. } => "SERIALIZATION_ERROR",
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { errors } => {
                write!(f, "validation failed for {} field(s)", errors.len())
            }
            Self::NotFound { entity } => write!(f, "{} not found", entity),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Conflict { what } => write!(f, "{} already exists", what),
            Self::Database { operation, details } => {
                write!(f, "database error during '{}': {}", operation, details)
            }
            Self::Serialization { details } => write!(f, "serialization error: {}", details),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => CoreError::NotFound { entity: "row" },
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CoreError::Conflict { what: "row" }
            }
            _ => CoreError::Database {
                operation: "query",
                details: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let cases: Vec<(CoreError, &str)> = vec![
            (CoreError::validation("name", "required"), "VALIDATION_ERROR"),
            (CoreError::NotFound { entity: "server" }, "NOT_FOUND"),
            (CoreError::Unauthorized, "UNAUTHORIZED"),
            (CoreError::Conflict { what: "email" }, "CONFLICT"),
            (
                CoreError::Database {
                    operation: "insert",
                    details: "connection refused".to_string(),
                },
                "DATABASE_ERROR",
            ),
            (
                CoreError::Serialization {
                    details: "eof".to_string(),
                },
                "SERIALIZATION_ERROR",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.error_code(), expected, "for {:?}", error);
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            CoreError::NotFound { entity: "server" }.to_string(),
            "server not found"
        );
        assert_eq!(
            CoreError::Conflict { what: "email" }.to_string(),
            "email already exists"
        );
        assert_eq!(
            CoreError::Database {
                operation: "insert",
                details: "boom".to_string()
            }
            .to_string(),
            "database error during 'insert': boom"
        );
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: CoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
