// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request authentication for the two caller classes.
//!
//! Agents present `Authorization: Bearer <server_uuid>.<secret>`; the
//! middleware verifies the secret against the stored hash and injects the
//! caller's server id. Users present the `access_token` session cookie; the
//! middleware validates the token and injects the user id.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use horizonx_protocol::AgentCredentials;

use crate::error::CoreError;
use crate::http::AppState;

/// Session cookie carrying the user JWT.
pub const SESSION_COOKIE: &str = "access_token";

/// Authenticated agent caller, injected by [`agent_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AgentContext {
    pub server_id: Uuid,
}

/// Authenticated user caller, injected by [`user_auth`].
#[derive(Debug, Clone, Copy)]
pub struct UserContext {
    pub user_id: i64,
}

/// Extract a named cookie from the `Cookie` header.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Parse and verify agent credentials from request headers.
pub async fn authorize_agent_headers(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AgentContext, CoreError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(CoreError::Unauthorized)?;
    let creds =
        AgentCredentials::from_authorization_header(header).map_err(|_| CoreError::Unauthorized)?;
    let server = state.servers.authorize_agent(&creds).await?;
    Ok(AgentContext {
        server_id: server.id,
    })
}

/// Middleware for agent-authenticated endpoints.
pub async fn agent_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, CoreError> {
    let context = authorize_agent_headers(&state, request.headers()).await?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Validate the session cookie and resolve the user id.
pub fn authorize_user_headers(state: &AppState, headers: &HeaderMap) -> Result<UserContext, CoreError> {
    let token = cookie(headers, SESSION_COOKIE).ok_or(CoreError::Unauthorized)?;
    let user_id = state.auth.validate_token(&token)?;
    Ok(UserContext { user_id })
}

/// Middleware for user-authenticated endpoints.
pub async fn user_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, CoreError> {
    let context = authorize_user_headers(&state, request.headers())?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; access_token=abc.def.ghi; lang=en"),
        );
        assert_eq!(
            cookie(&headers, SESSION_COOKIE).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_header_absent() {
        let headers = HeaderMap::new();
        assert_eq!(cookie(&headers, SESSION_COOKIE), None);
    }
}
