// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! WebSocket upgrade endpoints.
//!
//! Agents authenticate with the bearer token and skip the origin check;
//! user sessions authenticate with the session cookie and must come from an
//! allowed origin.

use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::ORIGIN;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use horizonx_protocol::MAX_FRAME_SIZE;

use crate::error::CoreError;
use crate::http::AppState;
use crate::http::auth;
use crate::hub::{ClientIdentity, session};

/// `GET /ws/agent`
pub async fn agent(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Result<Response, CoreError> {
    let context = auth::authorize_agent_headers(&state, &headers).await?;
    let server_id = context.server_id;
    info!(server_id = %server_id, "agent websocket authorized");

    let hub = state.agent_hub.clone();
    let ingest = state.agent_ingest.clone();
    Ok(ws
        .max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| {
            session::run(socket, ClientIdentity::Agent(server_id), hub, Some(ingest))
        })
        .into_response())
}

/// `GET /ws/user`
pub async fn user(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Result<Response, CoreError> {
    check_origin(&state, &headers)?;
    let context = auth::authorize_user_headers(&state, &headers)?;
    let user_id = context.user_id;

    let hub = state.user_hub.clone();
    Ok(ws
        .max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| {
            session::run(socket, ClientIdentity::User(user_id), hub, None)
        })
        .into_response())
}

/// A missing origin is allowed (non-browser clients); a present one must be
/// on the allow-list.
fn check_origin(state: &AppState, headers: &HeaderMap) -> Result<(), CoreError> {
    let Some(origin) = headers.get(ORIGIN).and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };
    if state.config.allowed_origins.iter().any(|o| o == origin) {
        Ok(())
    } else {
        warn!(origin, "websocket origin rejected");
        Err(CoreError::Unauthorized)
    }
}
