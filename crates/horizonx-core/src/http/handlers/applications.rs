// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application endpoints, including deploy/start/stop/restart triggers and
//! the agent-side health batch.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ApplicationHealthReport, ApplicationSaveRequest, Deployment, Job, JobType};
use crate::error::CoreError;
use crate::http::AppState;
use crate::http::auth::{AgentContext, UserContext};
use crate::http::envelope;

#[derive(Debug, Deserialize)]
pub struct ApplicationListQuery {
    pub server_id: Option<Uuid>,
}

/// `GET /api/applications`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Response, CoreError> {
    let apps = state.applications.list(query.server_id).await?;
    Ok(envelope::ok(apps))
}

/// `GET /api/applications/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
) -> Result<Response, CoreError> {
    let app = state.applications.get(application_id).await?;
    Ok(envelope::ok(app))
}

/// `POST /api/applications`
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<ApplicationSaveRequest>,
) -> Result<Response, CoreError> {
    let app = state.applications.create(req).await?;
    Ok(envelope::created(app))
}

/// `PUT /api/applications/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
    Json(req): Json<ApplicationSaveRequest>,
) -> Result<Response, CoreError> {
    state.applications.update(application_id, req).await?;
    Ok(envelope::message("application updated"))
}

/// `DELETE /api/applications/{id}`
pub async fn delete(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
) -> Result<Response, CoreError> {
    state.applications.delete(application_id).await?;
    Ok(envelope::message("application deleted"))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeployRequest {
    pub branch: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeployResponse {
    deployment: Deployment,
    job: Job,
}

/// `POST /api/applications/{id}/deploy`
pub async fn deploy(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
    Extension(user): Extension<UserContext>,
    Json(req): Json<DeployRequest>,
) -> Result<Response, CoreError> {
    let (deployment, job) = state
        .applications
        .deploy(application_id, req.branch, user.user_id)
        .await?;
    Ok(envelope::created(DeployResponse { deployment, job }))
}

/// `POST /api/applications/{id}/start`
pub async fn start(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
) -> Result<Response, CoreError> {
    let job = state
        .applications
        .control(application_id, JobType::AppStart)
        .await?;
    Ok(envelope::created(job))
}

/// `POST /api/applications/{id}/stop`
pub async fn stop(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
) -> Result<Response, CoreError> {
    let job = state
        .applications
        .control(application_id, JobType::AppStop)
        .await?;
    Ok(envelope::created(job))
}

/// `POST /api/applications/{id}/restart`
pub async fn restart(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
) -> Result<Response, CoreError> {
    let job = state
        .applications
        .control(application_id, JobType::AppRestart)
        .await?;
    Ok(envelope::created(job))
}

/// `POST /applications/health` (agent)
pub async fn health(
    State(state): State<AppState>,
    Extension(_agent): Extension<AgentContext>,
    Json(reports): Json<Vec<ApplicationHealthReport>>,
) -> Result<Response, CoreError> {
    state.applications.apply_health_reports(&reports).await;
    Ok(envelope::created(()))
}
