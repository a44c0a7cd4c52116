// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Log repository over PostgreSQL. Logs are append-only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Log, LogAction, LogContext, LogEmitRequest, LogLevel, LogListOptions,
    LogSource};
use crate::error::{CoreError, Result};
use crate::persistence::LogRepository;

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: i64,
    timestamp: DateTime<Utc>,
    level: String,
    source: String,
    action: String,
    trace_id: Uuid,
    job_id: Option<i64>,
    server_id: Option<Uuid>,
    application_id: Option<i64>,
    deployment_id: Option<i64>,
    message: String,
    context: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LogRow> for Log {
    type Error = CoreError;

    fn try_from(row: LogRow) -> Result<Self> {
        let level: LogLevel = serde_json::from_value(serde_json::Value::String(row.level))?;
        let source: LogSource = serde_json::from_value(serde_json::Value::String(row.source))?;
        let action: LogAction = serde_json::from_value(serde_json::Value::String(row.action))?;
        let context: Option<LogContext> =
            row.context.map(serde_json::from_value).transpose()?;

        Ok(Log {
            id: row.id,
            timestamp: row.timestamp,
            level,
            source,
            action,
            trace_id: row.trace_id,
            job_id: row.job_id,
            server_id: row.server_id,
            application_id: row.application_id,
            deployment_id: row.deployment_id,
            message: row.message,
            context,
            created_at: row.created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, timestamp, level, source, action, trace_id, job_id, \
     server_id, application_id, deployment_id, message, context, created_at";

pub struct PgLogRepository {
    pool: PgPool,
}

impl PgLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// One bound filter value for a dynamically assembled WHERE clause.
enum Filter {
    Uuid(Uuid),
    I64(i64),
    Names(Vec<String>),
}

#[async_trait]
impl LogRepository for PgLogRepository {
    async fn list(&self, opts: &LogListOptions) -> Result<(Vec<Log>, i64)> {
        let list = opts.list.clone().normalized();

        let mut conditions: Vec<String> = Vec::new();
        let mut filters: Vec<Filter> = Vec::new();
        if let Some(trace_id) = opts.trace_id {
            filters.push(Filter::Uuid(trace_id));
            conditions.push(format!("trace_id = ${}", filters.len()));
        }
        if let Some(job_id) = opts.job_id {
            filters.push(Filter::I64(job_id));
            conditions.push(format!("job_id = ${}", filters.len()));
        }
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
        if !opts.levels.is_empty() {
            let levels = opts.levels.iter().map(|l| l.as_str().to_string()).collect();
            filters.push(Filter::Names(levels));
            conditions.push(format!("level = ANY(${})", filters.len()));
        }
        if !opts.sources.is_empty() {
            let sources = opts.sources.iter().map(|s| s.as_str().to_string()).collect();
            filters.push(Filter::Names(sources));
            conditions.push(format!("source = ANY(${})", filters.len()));
        }
        let where_clause = if conditions.is_empty() {
            "TRUE".to_string()
        } else {
            conditions.join(" AND ")
        };

        let mut total = 0i64;
        if list.paginate {
            let count_sql = format!("SELECT COUNT(*) FROM logs WHERE {}", where_clause);
            let mut query = sqlx::query_scalar::<_, i64>(&count_sql);
            for filter in &filters {
                query = match filter {
                    Filter::Uuid(v) => query.bind(*v),
                    Filter::I64(v) => query.bind(*v),
                    Filter::Names(v) => query.bind(v.clone()),
                };
            }
            total = query.fetch_one(&self.pool).await?;
        }

        let select_sql = if list.paginate {
            format!(
                "SELECT {} FROM logs WHERE {} ORDER BY timestamp DESC LIMIT {} OFFSET {}",
                SELECT_COLUMNS,
                where_clause,
                list.limit,
                list.offset()
            )
        } else {
            format!(
                "SELECT {} FROM logs WHERE {} ORDER BY timestamp DESC LIMIT {}",
                SELECT_COLUMNS, where_clause, list.limit
            )
        };

        let mut query = sqlx::query_as::<_, LogRow>(&select_sql);
        for filter in &filters {
            query = match filter {
                Filter::Uuid(v) => query.bind(*v),
                Filter::I64(v) => query.bind(*v),
                Filter::Names(v) => query.bind(v.clone()),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;

        let logs = rows
            .into_iter()
            .map(Log::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok((logs, total))
    }

    async fn create(&self, req: &LogEmitRequest) -> Result<Log> {
        let context = req.context.as_ref().map(serde_json::to_value).transpose()?;

        let sql = format!(
            "INSERT INTO logs (timestamp, level, source, action, trace_id, job_id, server_id, \
             application_id, deployment_id, message, context) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LogRow>(&sql)
            .bind(req.timestamp)
            .bind(req.level.as_str())
            .bind(req.source.as_str())
            .bind(req.action.as_str())
            .bind(req.trace_id)
            .bind(req.job_id)
            .bind(req.server_id)
            .bind(req.application_id)
            .bind(req.deployment_id)
            .bind(&req.message)
            .bind(context)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }
}
