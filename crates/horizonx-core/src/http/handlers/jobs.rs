// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job endpoints: operator reads plus the agent poll/start/finish cycle.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{JobListOptions, JobStatus};
use crate::error::CoreError;
use crate::http::AppState;
use crate::http::auth::AgentContext;
use crate::http::envelope;
use crate::http::handlers::list_options;

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub paginate: Option<bool>,
    pub server_id: Option<Uuid>,
    pub application_id: Option<i64>,
    pub deployment_id: Option<i64>,
    pub trace_id: Option<Uuid>,
    pub status: Option<String>,
}

/// `GET /api/jobs`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Result<Response, CoreError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()
        .map_err(|_| CoreError::validation("status", "unknown status"))?;

    let result = state
        .jobs
        .list(JobListOptions {
            list: list_options(query.page, query.limit, query.search, query.paginate),
            server_id: query.server_id,
            application_id: query.application_id,
            deployment_id: query.deployment_id,
            trace_id: query.trace_id,
            status,
        })
        .await?;
    Ok(envelope::ok_list(result))
}

/// `GET /api/jobs/{id}` (logs attached)
pub async fn get(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Response, CoreError> {
    let job = state.jobs.get(job_id).await?;
    Ok(envelope::ok(job))
}

/// `POST /api/jobs/{id}/retry`
pub async fn retry(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Response, CoreError> {
    let job = state.jobs.retry(job_id).await?;
    Ok(envelope::created(job))
}

/// `GET /jobs/pending` (agent): pending jobs for the caller's server.
pub async fn pending(
    State(state): State<AppState>,
    Extension(agent): Extension<AgentContext>,
) -> Result<Response, CoreError> {
    let jobs = state.jobs.pending(agent.server_id).await?;
    Ok(envelope::ok(jobs))
}

/// `POST /jobs/{id}/start` (agent)
pub async fn start(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Extension(agent): Extension<AgentContext>,
) -> Result<Response, CoreError> {
    let job = state.jobs.get(job_id).await?;
    if job.server_id != agent.server_id {
        return Err(CoreError::Unauthorized);
    }

    let job = state.jobs.start(job_id).await?;
    Ok(envelope::ok(job))
}

#[derive(Debug, Deserialize)]
pub struct FinishRequest {
    pub status: JobStatus,
}

/// `POST /jobs/{id}/finish` (agent)
pub async fn finish(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Extension(agent): Extension<AgentContext>,
    Json(req): Json<FinishRequest>,
) -> Result<Response, CoreError> {
    let job = state.jobs.get(job_id).await?;
    if job.server_id != agent.server_id {
        return Err(CoreError::Unauthorized);
    }

    let job = state.jobs.finish(job_id, req.status).await?;
    Ok(envelope::ok(job))
}
