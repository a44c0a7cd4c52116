// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends.
//!
//! Repositories are the source of truth for entity state; services publish
//! domain events only after the corresponding repository write succeeds.
//! Every user-visible read excludes soft-deleted rows.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Application, ApplicationSaveRequest, ApplicationStatus, Deployment, DeploymentStatus, Job,
    JobListOptions, JobStatus, Log, LogEmitRequest, LogListOptions, Metrics, Server,
    ServerListOptions, User,
};
use crate::error::Result;

/// Persistence for managed servers.
#[async_trait]
pub trait ServerRepository: Send + Sync {
    /// List servers matching the filter; the count is only computed for
    /// paginated queries.
    async fn list(&self, opts: &ServerListOptions) -> Result<(Vec<Server>, i64)>;

    async fn get_by_id(&self, server_id: Uuid) -> Result<Server>;

    async fn create(&self, server: &Server) -> Result<Server>;

    async fn update(&self, server_id: Uuid, name: &str, ip_address: Option<&str>) -> Result<()>;

    /// Soft delete; the row stays but disappears from every query.
    async fn soft_delete(&self, server_id: Uuid) -> Result<()>;

    async fn update_status(&self, server_id: Uuid, is_online: bool) -> Result<()>;

    async fn update_os_info(&self, server_id: Uuid, os_info: &crate::domain::OsInfo) -> Result<()>;
}

/// Persistence for operator accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_id(&self, user_id: i64) -> Result<User>;

    async fn get_by_email(&self, email: &str) -> Result<User>;

    /// Insert or, when the email already exists among live rows, replace the
    /// stored password. Used by the seeder.
    async fn upsert_by_email(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role_id: i64,
    ) -> Result<i64>;
}

/// Persistence for jobs.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn list(&self, opts: &JobListOptions) -> Result<(Vec<Job>, i64)>;

    /// Pending jobs for one server, oldest first.
    async fn pending(&self, server_id: Uuid) -> Result<Vec<Job>>;

    async fn get_by_id(&self, job_id: i64) -> Result<Job>;

    async fn create(&self, job: &Job) -> Result<Job>;

    /// `pending → running`, stamping `started_at`.
    async fn mark_running(&self, job_id: i64) -> Result<Job>;

    /// `running → success|failed`, stamping `finished_at`. Idempotent: a
    /// replayed terminal transition returns the stored row unchanged.
    async fn mark_finished(&self, job_id: i64, status: JobStatus) -> Result<Job>;
}

/// Persistence for deployments.
#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    async fn list(&self, application_id: Option<i64>, limit: i64) -> Result<Vec<Deployment>>;

    async fn get_by_id(&self, deployment_id: i64) -> Result<Deployment>;

    async fn create(&self, deployment: &Deployment) -> Result<Deployment>;

    /// Update the status, stamping `started_at` on entry to `deploying` and
    /// `finished_at` on entry to a terminal state.
    async fn update_status(&self, deployment_id: i64, status: DeploymentStatus)
    -> Result<Deployment>;

    async fn update_commit_info(
        &self,
        deployment_id: i64,
        commit_hash: &str,
        commit_message: &str,
    ) -> Result<Deployment>;
}

/// Persistence for applications.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn list(&self, server_id: Option<Uuid>) -> Result<Vec<Application>>;

    async fn get_by_id(&self, application_id: i64) -> Result<Application>;

    async fn create(&self, req: &ApplicationSaveRequest) -> Result<Application>;

    async fn update(&self, application_id: i64, req: &ApplicationSaveRequest) -> Result<()>;

    async fn soft_delete(&self, application_id: i64) -> Result<()>;

    async fn update_health(&self, application_id: i64, status: ApplicationStatus) -> Result<()>;

    /// Ids of live applications bound to a server.
    async fn ids_for_server(&self, server_id: Uuid) -> Result<Vec<i64>>;
}

/// Persistence for append-only log records.
#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn list(&self, opts: &LogListOptions) -> Result<(Vec<Log>, i64)>;

    async fn create(&self, req: &LogEmitRequest) -> Result<Log>;
}

/// Persistence for telemetry samples.
#[async_trait]
pub trait MetricsRepository: Send + Sync {
    async fn bulk_insert(&self, samples: &[Metrics]) -> Result<()>;

    /// Delete samples older than `cutoff` for a server.
    async fn cleanup(&self, server_id: Uuid, cutoff: DateTime<Utc>) -> Result<u64>;
}
