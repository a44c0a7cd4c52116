// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Metrics endpoints: agent ingest plus history reads.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::domain::Metrics;
use crate::error::CoreError;
use crate::http::AppState;
use crate::http::auth::AgentContext;
use crate::http::envelope;

/// `POST /metrics` (agent)
pub async fn ingest(
    State(state): State<AppState>,
    Extension(agent): Extension<AgentContext>,
    Json(mut sample): Json<Metrics>,
) -> Result<Response, CoreError> {
    sample.server_id = agent.server_id;
    state.metrics.ingest(sample).await?;
    Ok(envelope::created(()))
}

/// `GET /api/metrics/servers/{id}/latest`
pub async fn latest(
    State(state): State<AppState>,
    Path(server_id): Path<Uuid>,
) -> Result<Response, CoreError> {
    let sample = state.metrics.latest(server_id).await?;
    Ok(envelope::ok(sample))
}

/// `GET /api/metrics/servers/{id}/cpu`
pub async fn cpu_history(
    State(state): State<AppState>,
    Path(server_id): Path<Uuid>,
) -> Result<Response, CoreError> {
    let history = state.metrics.cpu_usage_history(server_id).await?;
    Ok(envelope::ok(history))
}

/// `GET /api/metrics/servers/{id}/net`
pub async fn net_history(
    State(state): State<AppState>,
    Path(server_id): Path<Uuid>,
) -> Result<Response, CoreError> {
    let history = state.metrics.net_speed_history(server_id).await?;
    Ok(envelope::ok(history))
}
