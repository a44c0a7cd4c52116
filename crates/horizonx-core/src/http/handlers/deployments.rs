// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::error::CoreError;
use crate::http::AppState;
use crate::http::auth::AgentContext;
use crate::http::envelope;

#[derive(Debug, Deserialize)]
pub struct DeploymentListQuery {
    pub application_id: Option<i64>,
    pub limit: Option<i64>,
}

/// `GET /api/deployments`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<DeploymentListQuery>,
) -> Result<Response, CoreError> {
    let deployments = state
        .deployments
        .list(query.application_id, query.limit.unwrap_or(50))
        .await?;
    Ok(envelope::ok(deployments))
}

/// `GET /api/deployments/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(deployment_id): Path<i64>,
) -> Result<Response, CoreError> {
    let deployment = state.deployments.get(deployment_id).await?;
    Ok(envelope::ok(deployment))
}

#[derive(Debug, Deserialize)]
pub struct CommitInfoRequest {
    pub commit_hash: String,
    pub commit_message: String,
}

/// `POST /deployments/{id}/commit-info` (agent)
pub async fn commit_info(
    State(state): State<AppState>,
    Path(deployment_id): Path<i64>,
    Extension(_agent): Extension<AgentContext>,
    Json(req): Json<CommitInfoRequest>,
) -> Result<Response, CoreError> {
    if req.commit_hash.trim().is_empty() {
        return Err(CoreError::validation("commit_hash", "required"));
    }

    let deployment = state
        .deployments
        .update_commit_info(deployment_id, &req.commit_hash, &req.commit_message)
        .await?;
    Ok(envelope::ok(deployment))
}
