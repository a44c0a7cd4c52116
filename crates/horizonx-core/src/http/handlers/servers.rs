// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Server endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Server, ServerListOptions, ServerSaveRequest};
use crate::error::CoreError;
use crate::http::AppState;
use crate::http::envelope;
use crate::http::handlers::list_options;

#[derive(Debug, Deserialize)]
pub struct ServerListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub paginate: Option<bool>,
    pub is_online: Option<bool>,
}

/// `GET /api/servers`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ServerListQuery>,
) -> Result<Response, CoreError> {
    let result = state
        .servers
        .list(ServerListOptions {
            list: list_options(query.page, query.limit, query.search, query.paginate),
            is_online: query.is_online,
        })
        .await?;
    Ok(envelope::ok_list(result))
}

/// `GET /api/servers/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(server_id): Path<Uuid>,
) -> Result<Response, CoreError> {
    let server = state.servers.get(server_id).await?;
    Ok(envelope::ok(server))
}

/// Registration response: the only place the plaintext token appears.
#[derive(Debug, Serialize)]
struct RegisterResponse {
    server: Server,
    token: String,
}

/// `POST /api/servers`
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<ServerSaveRequest>,
) -> Result<Response, CoreError> {
    let (server, token) = state.servers.register(req).await?;
    Ok(envelope::created(RegisterResponse { server, token }))
}

/// `PUT /api/servers/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(server_id): Path<Uuid>,
    Json(req): Json<ServerSaveRequest>,
) -> Result<Response, CoreError> {
    state.servers.update(server_id, req).await?;
    Ok(envelope::message("server updated"))
}

/// `DELETE /api/servers/{id}`
pub async fn delete(
    State(state): State<AppState>,
    Path(server_id): Path<Uuid>,
) -> Result<Response, CoreError> {
    state.servers.delete(server_id).await?;
    Ok(envelope::message("server deleted"))
}
