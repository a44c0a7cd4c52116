// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job repository over PostgreSQL.
//!
//! Status transitions are enforced in SQL: `mark_running` only moves
//! `pending` rows, `mark_finished` only moves `running` rows. A replayed
//! terminal transition finds zero matching rows and falls back to returning
//! the stored row, which makes `finish` idempotent for at-least-once agents.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Job, JobListOptions, JobStatus, JobType};
use crate::error::{CoreError, Result};
use crate::persistence::JobRepository;

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    trace_id: Uuid,
    #[sqlx(rename = "type")]
    job_type: String,
    server_id: Uuid,
    application_id: Option<i64>,
    deployment_id: Option<i64>,
    payload: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = CoreError;

    fn try_from(row: JobRow) -> Result<Self> {
        let job_type: JobType = row
            .job_type
            .parse()
            .map_err(|details| CoreError::Serialization { details })?;
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|details| CoreError::Serialization { details })?;
        Ok(Job {
            id: row.id,
            trace_id: row.trace_id,
            job_type,
            server_id: row.server_id,
            application_id: row.application_id,
            deployment_id: row.deployment_id,
            payload: row.payload,
            status,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            logs: Vec::new(),
        })
    }
}

const SELECT_COLUMNS: &str = "id, trace_id, type, server_id, application_id, deployment_id, \
     payload, status, created_at, started_at, finished_at";

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, job_id: i64) -> Result<Job> {
        let sql = format!("SELECT {} FROM jobs WHERE id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CoreError::NotFound { entity: "job" })?;
        row.try_into()
    }
}

/// One bound filter value for a dynamically assembled WHERE clause.
enum Filter {
    Uuid(Uuid),
    I64(i64),
    Str(&'static str),
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn list(&self, opts: &JobListOptions) -> Result<(Vec<Job>, i64)> {
        let list = opts.list.clone().normalized();

        let mut conditions: Vec<String> = Vec::new();
        let mut filters: Vec<Filter> = Vec::new();
        if let Some(server_id) = opts.server_id {
            filters.push(Filter::Uuid(server_id));
            conditions.push(format!("server_id = ${}", filters.len()));
        }
        if let Some(app_id) = opts.application_id {
            filters.push(Filter::I64(app_id));
            conditions.push(format!("application_id = ${}", filters.len()));
        }
        if let Some(deployment_id) = opts.deployment_id {
            filters.push(Filter::I64(deployment_id));
            conditions.push(format!("deployment_id = ${}", filters.len()));
        }
        if let Some(trace_id) = opts.trace_id {
            filters.push(Filter::Uuid(trace_id));
            conditions.push(format!("trace_id = ${}", filters.len()));
        }
        if let Some(status) = opts.status {
            filters.push(Filter::Str(status.as_str()));
            conditions.push(format!("status = ${}", filters.len()));
        }
        let where_clause = if conditions.is_empty() {
            "TRUE".to_string()
        } else {
            conditions.join(" AND ")
        };

        let mut total = 0i64;
        if list.paginate {
            let count_sql = format!("SELECT COUNT(*) FROM jobs WHERE {}", where_clause);
            let mut query = sqlx::query_scalar::<_, i64>(&count_sql);
            for filter in &filters {
                query = match filter {
                    Filter::Uuid(v) => query.bind(*v),
                    Filter::I64(v) => query.bind(*v),
                    Filter::Str(v) => query.bind(*v),
                };
            }
            total = query.fetch_one(&self.pool).await?;
        }

        let select_sql = if list.paginate {
            format!(
                "SELECT {} FROM jobs WHERE {} ORDER BY created_at DESC LIMIT {} OFFSET {}",
                SELECT_COLUMNS,
                where_clause,
                list.limit,
                list.offset()
            )
        } else {
            format!(
                "SELECT {} FROM jobs WHERE {} ORDER BY created_at DESC LIMIT {}",
                SELECT_COLUMNS, where_clause, list.limit
            )
        };

        let mut query = sqlx::query_as::<_, JobRow>(&select_sql);
        for filter in &filters {
            query = match filter {
                Filter::Uuid(v) => query.bind(*v),
                Filter::I64(v) => query.bind(*v),
                Filter::Str(v) => query.bind(*v),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;

        let jobs = rows
            .into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok((jobs, total))
    }

    async fn pending(&self, server_id: Uuid) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {} FROM jobs WHERE server_id = $1 AND status = 'pending' \
             ORDER BY created_at ASC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(server_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn get_by_id(&self, job_id: i64) -> Result<Job> {
        self.fetch(job_id).await
    }

    async fn create(&self, job: &Job) -> Result<Job> {
        let sql = format!(
            "INSERT INTO jobs (trace_id, type, server_id, application_id, deployment_id, \
             payload, status) VALUES ($1, $2, $3, $4, $5, $6, 'pending') RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job.trace_id)
            .bind(job.job_type.as_str())
            .bind(job.server_id)
            .bind(job.application_id)
            .bind(job.deployment_id)
            .bind(&job.payload)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn mark_running(&self, job_id: i64) -> Result<Job> {
        let sql = format!(
            "UPDATE jobs SET status = 'running', started_at = NOW() \
             WHERE id = $1 AND status = 'pending' RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            // Already moved past pending; return the stored row so a
            // duplicate start is harmless.
            None => self.fetch(job_id).await,
        }
    }

    async fn mark_finished(&self, job_id: i64, status: JobStatus) -> Result<Job> {
        if !status.is_terminal() {
            return Err(CoreError::validation(
                "status",
                "finish requires a terminal status",
            ));
        }

        let sql = format!(
            "UPDATE jobs SET status = $2, finished_at = NOW() \
             WHERE id = $1 AND status = 'running' RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => self.fetch(job_id).await,
        }
    }
}
