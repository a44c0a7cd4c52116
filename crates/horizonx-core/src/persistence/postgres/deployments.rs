// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment repository over PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Deployment, DeploymentStatus};
use crate::error::{CoreError, Result};
use crate::persistence::DeploymentRepository;

#[derive(Debug, sqlx::FromRow)]
struct DeploymentRow {
    id: i64,
    application_id: i64,
    branch: String,
    commit_hash: Option<String>,
    commit_message: Option<String>,
    status: String,
    triggered_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    deployed_by: i64,
}

impl TryFrom<DeploymentRow> for Deployment {
    type Error = CoreError;

    fn try_from(row: DeploymentRow) -> Result<Self> {
        let status: DeploymentStatus = row
            .status
            .parse()
            .map_err(|details| CoreError::Serialization { details })?;
        Ok(Deployment {
            id: row.id,
            application_id: row.application_id,
            branch: row.branch,
            commit_hash: row.commit_hash,
            commit_message: row.commit_message,
            status,
            triggered_at: row.triggered_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            deployed_by: row.deployed_by,
        })
    }
}

const SELECT_COLUMNS: &str = "id, application_id, branch, commit_hash, commit_message, status, \
     triggered_at, started_at, finished_at, deployed_by";

pub struct PgDeploymentRepository {
    pool: PgPool,
}

impl PgDeploymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeploymentRepository for PgDeploymentRepository {
    async fn list(&self, application_id: Option<i64>, limit: i64) -> Result<Vec<Deployment>> {
        let limit = if limit <= 0 { 50 } else { limit };

        let rows = match application_id {
            Some(app_id) => {
                let sql = format!(
                    "SELECT {} FROM deployments WHERE application_id = $1 \
                     ORDER BY triggered_at DESC LIMIT $2",
                    SELECT_COLUMNS
                );
                sqlx::query_as::<_, DeploymentRow>(&sql)
                    .bind(app_id)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM deployments ORDER BY triggered_at DESC LIMIT $1",
                    SELECT_COLUMNS
                );
                sqlx::query_as::<_, DeploymentRow>(&sql)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Deployment::try_from).collect()
    }

    async fn get_by_id(&self, deployment_id: i64) -> Result<Deployment> {
        let sql = format!("SELECT {} FROM deployments WHERE id = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, DeploymentRow>(&sql)
            .bind(deployment_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "deployment",
            })?;
        row.try_into()
    }

    async fn create(&self, deployment: &Deployment) -> Result<Deployment> {
        let sql = format!(
            "INSERT INTO deployments (application_id, branch, status, deployed_by) \
             VALUES ($1, $2, 'pending', $3) RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, DeploymentRow>(&sql)
            .bind(deployment.application_id)
            .bind(&deployment.branch)
            .bind(deployment.deployed_by)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn update_status(
        &self,
        deployment_id: i64,
        status: DeploymentStatus,
    ) -> Result<Deployment> {
        let sql = format!(
            "UPDATE deployments SET status = $2, \
             started_at = CASE WHEN $2 = 'deploying' AND started_at IS NULL \
                 THEN NOW() ELSE started_at END, \
             finished_at = CASE WHEN $2 IN ('success', 'failed') \
                 THEN NOW() ELSE finished_at END \
             WHERE id = $1 RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, DeploymentRow>(&sql)
            .bind(deployment_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "deployment",
            })?;
        row.try_into()
    }

    async fn update_commit_info(
        &self,
        deployment_id: i64,
        commit_hash: &str,
        commit_message: &str,
    ) -> Result<Deployment> {
        let sql = format!(
            "UPDATE deployments SET commit_hash = $2, commit_message = $3 \
             WHERE id = $1 RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, DeploymentRow>(&sql)
            .bind(deployment_id)
            .bind(commit_hash)
            .bind(commit_message)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "deployment",
            })?;
        row.try_into()
    }
}
