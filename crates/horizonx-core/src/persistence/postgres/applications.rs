// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application repository over PostgreSQL.
//!
//! Environment variables live in `application_env_vars` and are attached to
//! the entity on read.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Application, ApplicationSaveRequest, ApplicationStatus};
use crate::error::{CoreError, Result};
use crate::persistence::ApplicationRepository;

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: i64,
    server_id: Uuid,
    name: String,
    repo_url: String,
    branch: String,
    health: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = CoreError;

    fn try_from(row: ApplicationRow) -> Result<Self> {
        let health: ApplicationStatus = row
            .health
            .parse()
            .map_err(|details| CoreError::Serialization { details })?;
        Ok(Application {
            id: row.id,
            server_id: row.server_id,
            name: row.name,
            repo_url: row.repo_url,
            branch: row.branch,
            env_vars: HashMap::new(),
            health,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, server_id, name, repo_url, branch, health, created_at, updated_at";

pub struct PgApplicationRepository {
    pool: PgPool,
}

impl PgApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_env_vars(&self, app: &mut Application) -> Result<()> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM application_env_vars WHERE application_id = $1",
        )
        .bind(app.id)
        .fetch_all(&self.pool)
        .await?;
        app.env_vars = rows.into_iter().collect();
        Ok(())
    }

    async fn replace_env_vars(
        &self,
        application_id: i64,
        env_vars: &HashMap<String, String>,
    ) -> Result<()> {
        sqlx::query("DELETE FROM application_env_vars WHERE application_id = $1")
            .bind(application_id)
            .execute(&self.pool)
            .await?;

        for (key, value) in env_vars {
            sqlx::query(
                "INSERT INTO application_env_vars (application_id, key, value) \
                 VALUES ($1, $2, $3)",
            )
            .bind(application_id)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ApplicationRepository for PgApplicationRepository {
    async fn list(&self, server_id: Option<Uuid>) -> Result<Vec<Application>> {
        let rows = match server_id {
            Some(server_id) => {
                let sql = format!(
                    "SELECT {} FROM applications \
                     WHERE server_id = $1 AND deleted_at IS NULL ORDER BY created_at ASC",
                    SELECT_COLUMNS
                );
                sqlx::query_as::<_, ApplicationRow>(&sql)
                    .bind(server_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM applications WHERE deleted_at IS NULL \
                     ORDER BY created_at ASC",
                    SELECT_COLUMNS
                );
                sqlx::query_as::<_, ApplicationRow>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut apps = rows
            .into_iter()
            .map(Application::try_from)
            .collect::<Result<Vec<_>>>()?;
        for app in &mut apps {
            self.attach_env_vars(app).await?;
        }
        Ok(apps)
    }

    async fn get_by_id(&self, application_id: i64) -> Result<Application> {
        let sql = format!(
            "SELECT {} FROM applications WHERE id = $1 AND deleted_at IS NULL",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(application_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "application",
            })?;
        let mut app: Application = row.try_into()?;
        self.attach_env_vars(&mut app).await?;
        Ok(app)
    }

    async fn create(&self, req: &ApplicationSaveRequest) -> Result<Application> {
        let server_id = req
            .server_id
            .ok_or_else(|| CoreError::validation("server_id", "required"))?;

        let sql = format!(
            "INSERT INTO applications (server_id, name, repo_url, branch, health) \
             VALUES ($1, $2, $3, $4, 'stopped') RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(server_id)
            .bind(&req.name)
            .bind(&req.repo_url)
            .bind(&req.branch)
            .fetch_one(&self.pool)
            .await?;
        let mut app: Application = row.try_into()?;

        self.replace_env_vars(app.id, &req.env_vars).await?;
        app.env_vars = req.env_vars.clone();
        Ok(app)
    }

    async fn update(&self, application_id: i64, req: &ApplicationSaveRequest) -> Result<()> {
        let result = sqlx::query(
            "UPDATE applications SET name = $2, repo_url = $3, branch = $4, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(application_id)
        .bind(&req.name)
        .bind(&req.repo_url)
        .bind(&req.branch)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                entity: "application",
            });
        }

        self.replace_env_vars(application_id, &req.env_vars).await
    }

    async fn soft_delete(&self, application_id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE applications SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(application_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                entity: "application",
            });
        }
        Ok(())
    }

    async fn update_health(&self, application_id: i64, status: ApplicationStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE applications SET health = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(application_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                entity: "application",
            });
        }
        Ok(())
    }

    async fn ids_for_server(&self, server_id: Uuid) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM applications WHERE server_id = $1 AND deleted_at IS NULL",
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
