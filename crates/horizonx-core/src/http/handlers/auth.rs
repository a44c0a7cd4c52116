// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Session endpoints: login, logout, current user.

use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::header::SET_COOKIE;
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::error::CoreError;
use crate::http::AppState;
use crate::http::auth::{SESSION_COOKIE, UserContext};
use crate::http::envelope;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, CoreError> {
    if req.email.trim().is_empty() {
        return Err(CoreError::validation("email", "required"));
    }
    if req.password.is_empty() {
        return Err(CoreError::validation("password", "required"));
    }

    let (user, token) = state.auth.login(&req.email, &req.password).await?;

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE,
        token,
        state.config.jwt_expiry.as_secs()
    );

    let mut response = envelope::ok(user);
    response.headers_mut().insert(
        SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|_| CoreError::Unauthorized)?,
    );
    Ok(response)
}

/// `POST /api/auth/logout`
pub async fn logout() -> Response {
    let cookie = format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE);
    let mut response = envelope::message("logged out");
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}

/// `GET /api/auth/me`
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<UserContext>,
) -> Result<Response, CoreError> {
    let user = state
        .auth
        .user_for_id(user.user_id)
        .await
        .map_err(|_| CoreError::Unauthorized)?;
    Ok(envelope::ok(user))
}
