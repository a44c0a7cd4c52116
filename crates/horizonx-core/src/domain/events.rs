// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain event payloads carried on the event bus.
//!
//! Services publish an [`Event`] after the corresponding repository write
//! succeeds; subscribers project the payload onto the outbound protocol or
//! trigger the next step of a workflow. Payloads serialize as-is for the
//! WebSocket fan-out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::deployment::DeploymentStatus;
use super::job::{JobStatus, JobType};
use super::log::Log;
use super::metrics::Metrics;

/// Common fields of job lifecycle events.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: i64,
    pub trace_id: Uuid,
    pub server_id: Uuid,
    pub application_id: Option<i64>,
    pub deployment_id: Option<i64>,
    #[serde(rename = "type")]
    pub job_type: JobType,
}

/// A job entered a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct JobFinished {
    #[serde(flatten)]
    pub job: JobEvent,
    pub status: JobStatus,
}

/// A job's status field changed.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusChanged {
    pub job_id: i64,
    pub trace_id: Uuid,
    pub status: JobStatus,
}

/// A deployment row was created.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentCreated {
    pub deployment_id: i64,
    pub application_id: i64,
    pub deployed_by: i64,
    pub triggered_at: DateTime<Utc>,
}

/// The owning deploy job started; the deployment is now `deploying`.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentStarted {
    pub deployment_id: i64,
    pub application_id: i64,
    pub started_at: DateTime<Utc>,
}

/// The deployment reached a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentFinished {
    pub deployment_id: i64,
    pub application_id: i64,
    pub status: DeploymentStatus,
    pub finished_at: DateTime<Utc>,
}

/// A deployment's status field changed.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentStatusChanged {
    pub deployment_id: i64,
    pub application_id: i64,
    pub status: DeploymentStatus,
}

/// The agent reported HEAD for a deployment.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentCommitInfoReceived {
    pub deployment_id: i64,
    pub application_id: i64,
    pub commit_hash: String,
    pub commit_message: String,
}

/// Build output was appended to a deployment.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentLogsUpdated {
    pub deployment_id: i64,
    pub application_id: i64,
    pub logs: String,
    pub is_partial: bool,
}

/// Application lifecycle event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationEvent {
    pub application_id: i64,
    pub server_id: Uuid,
    pub status: super::application::ApplicationStatus,
}

/// A server's online flag flipped.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatusChanged {
    pub server_id: Uuid,
    pub is_online: bool,
}

/// Every domain event the bus carries.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Event {
    JobCreated(JobEvent),
    JobStarted(JobEvent),
    JobFinished(JobFinished),
    JobStatusChanged(JobStatusChanged),

    DeploymentCreated(DeploymentCreated),
    DeploymentStarted(DeploymentStarted),
    DeploymentFinished(DeploymentFinished),
    DeploymentStatusChanged(DeploymentStatusChanged),
    DeploymentCommitInfoReceived(DeploymentCommitInfoReceived),
    DeploymentLogsUpdated(DeploymentLogsUpdated),
    DeploymentCompleted(DeploymentFinished),

    ApplicationCreated(ApplicationEvent),
    ApplicationStatusChanged(ApplicationEvent),
    ApplicationDeployed(ApplicationEvent),

    ServerStatusChanged(ServerStatusChanged),
    ServerMetricsReceived(Metrics),
    LogReceived(Log),
}
