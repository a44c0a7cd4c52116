// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Log endpoints: operator reads and the agent ingest path.

use axum::extract::{Query, State};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{LogEmitRequest, LogListOptions};
use crate::error::CoreError;
use crate::http::AppState;
use crate::http::auth::AgentContext;
use crate::http::envelope;
use crate::http::handlers::list_options;

#[derive(Debug, Deserialize)]
pub struct LogListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub paginate: Option<bool>,
    pub trace_id: Option<Uuid>,
    pub job_id: Option<i64>,
    pub server_id: Option<Uuid>,
    pub application_id: Option<i64>,
    pub deployment_id: Option<i64>,
}

/// `GET /api/logs`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<LogListQuery>,
) -> Result<Response, CoreError> {
    let result = state
        .logs
        .list(LogListOptions {
            list: list_options(query.page, query.limit, query.search, query.paginate),
            trace_id: query.trace_id,
            job_id: query.job_id,
            server_id: query.server_id,
            application_id: query.application_id,
            deployment_id: query.deployment_id,
            levels: Vec::new(),
            sources: Vec::new(),
        })
        .await?;
    Ok(envelope::ok_list(result))
}

/// `POST /logs` (agent)
pub async fn ingest(
    State(state): State<AppState>,
    Extension(agent): Extension<AgentContext>,
    Json(mut req): Json<LogEmitRequest>,
) -> Result<Response, CoreError> {
    // The authenticated session owns the server id.
    req.server_id = Some(agent.server_id);
    let log = state.logs.create(req).await?;
    Ok(envelope::created(log))
}
