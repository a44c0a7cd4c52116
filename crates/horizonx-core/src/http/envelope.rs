// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Response envelope and error translation.
//!
//! Every handler answers with `{message?, data?, meta?}` on success or
//! `{message, errors: {field: msg}}` on validation failure. One envelope,
//! applied everywhere.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::{ListResult, Meta};
use crate::error::CoreError;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// `200 OK` with data.
pub fn ok<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(Envelope {
            message: None,
            data: Some(data),
            meta: None,
        }),
    )
        .into_response()
}

/// `201 Created` with data.
pub fn created<T: Serialize>(data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(Envelope {
            message: None,
            data: Some(data),
            meta: None,
        }),
    )
        .into_response()
}

/// `200 OK` with a list and optional pagination meta.
pub fn ok_list<T: Serialize>(result: ListResult<T>) -> Response {
    (
        StatusCode::OK,
        Json(Envelope {
            message: None,
            data: Some(result.data),
            meta: result.meta,
        }),
    )
        .into_response()
}

/// `200 OK` with a bare message.
pub fn message(text: &str) -> Response {
    (
        StatusCode::OK,
        Json(Envelope::<()> {
            message: Some(text.to_string()),
            data: None,
            meta: None,
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<std::collections::BTreeMap<String, String>>,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let (status, errors) = match &self {
            CoreError::Validation { errors } => (StatusCode::BAD_REQUEST, Some(errors.clone())),
            CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, None),
            CoreError::Unauthorized => (StatusCode::UNAUTHORIZED, None),
            CoreError::Conflict { .. } => (StatusCode::BAD_REQUEST, None),
            CoreError::Database { .. } | CoreError::Serialization { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let message = match &self {
            // Internal details never reach the wire.
            CoreError::Database { .. } | CoreError::Serialization { .. } => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { message, errors })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_400_with_field_map() {
        let response = CoreError::validation("name", "required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = CoreError::NotFound { entity: "server" }.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unauthorized_maps_to_401() {
        let response = CoreError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_database_error_hides_details() {
        let response = CoreError::Database {
            operation: "query",
            details: "password=hunter2".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_envelope_shape() {
        let value = serde_json::to_value(Envelope {
            message: None,
            data: Some(vec![1, 2, 3]),
            meta: Some(Meta::calculate(3, 1, 10)),
        })
        .unwrap();
        assert_eq!(value["data"], serde_json::json!([1, 2, 3]));
        assert_eq!(value["meta"]["total"], 3);
        assert!(value.get("message").is_none());
    }
}
