// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Server repository over PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{OsInfo, Server, ServerListOptions};
use crate::error::{CoreError, Result};
use crate::persistence::ServerRepository;

/// Raw server row; `os_info` stays JSONB until decode.
#[derive(Debug, sqlx::FromRow)]
struct ServerRow {
    id: Uuid,
    name: String,
    ip_address: Option<String>,
    api_token: String,
    is_online: bool,
    os_info: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ServerRow> for Server {
    type Error = CoreError;

    fn try_from(row: ServerRow) -> Result<Self> {
        let os_info: Option<OsInfo> = row
            .os_info
            .map(serde_json::from_value)
            .transpose()
            .map_err(CoreError::from)?;
        Ok(Server {
            id: row.id,
            name: row.name,
            ip_address: row.ip_address,
            api_token: row.api_token,
            is_online: row.is_online,
            os_info,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, name, ip_address, api_token, is_online, os_info, created_at, updated_at";

pub struct PgServerRepository {
    pool: PgPool,
}

impl PgServerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServerRepository for PgServerRepository {
    async fn list(&self, opts: &ServerListOptions) -> Result<(Vec<Server>, i64)> {
        let list = opts.list.clone().normalized();

        let mut conditions = vec!["deleted_at IS NULL".to_string()];
        let mut bind_search = None;
        if !list.search.is_empty() {
            conditions.push("(name ILIKE $1 OR ip_address ILIKE $1)".to_string());
            bind_search = Some(format!("%{}%", list.search));
        }
        if let Some(online) = opts.is_online {
            conditions.push(format!(
                "is_online IS {}",
                if online { "TRUE" } else { "FALSE" }
            ));
        }
        let where_clause = conditions.join(" AND ");

        let mut total = 0i64;
        if list.paginate {
            let count_sql = format!("SELECT COUNT(*) FROM servers WHERE {}", where_clause);
            let mut query = sqlx::query_scalar::<_, i64>(&count_sql);
            if let Some(ref s) = bind_search {
                query = query.bind(s);
            }
            total = query.fetch_one(&self.pool).await?;
        }

        let select_sql = if list.paginate {
            format!(
                "SELECT {} FROM servers WHERE {} ORDER BY created_at ASC LIMIT {} OFFSET {}",
                SELECT_COLUMNS,
                where_clause,
                list.limit,
                list.offset()
            )
        } else {
            format!(
                "SELECT {} FROM servers WHERE {} ORDER BY created_at ASC LIMIT {}",
                SELECT_COLUMNS, where_clause, list.limit
            )
        };

        let mut query = sqlx::query_as::<_, ServerRow>(&select_sql);
        if let Some(ref s) = bind_search {
            query = query.bind(s);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let servers = rows
            .into_iter()
            .map(Server::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok((servers, total))
    }

    async fn get_by_id(&self, server_id: Uuid) -> Result<Server> {
        let sql = format!(
            "SELECT {} FROM servers WHERE id = $1 AND deleted_at IS NULL",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, ServerRow>(&sql)
            .bind(server_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CoreError::NotFound { entity: "server" })?;
        row.try_into()
    }

    async fn create(&self, server: &Server) -> Result<Server> {
        let sql = format!(
            "INSERT INTO servers (name, ip_address, api_token, is_online) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, ServerRow>(&sql)
            .bind(&server.name)
            .bind(&server.ip_address)
            .bind(&server.api_token)
            .bind(server.is_online)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn update(&self, server_id: Uuid, name: &str, ip_address: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE servers SET name = $2, ip_address = $3, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(server_id)
        .bind(name)
        .bind(ip_address)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound { entity: "server" });
        }
        Ok(())
    }

    async fn soft_delete(&self, server_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE servers SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(server_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound { entity: "server" });
        }
        Ok(())
    }

    async fn update_status(&self, server_id: Uuid, is_online: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE servers SET is_online = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(server_id)
        .bind(is_online)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound { entity: "server" });
        }
        Ok(())
    }

    async fn update_os_info(&self, server_id: Uuid, os_info: &OsInfo) -> Result<()> {
        let value = serde_json::to_value(os_info)?;
        let result = sqlx::query(
            "UPDATE servers SET os_info = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(server_id)
        .bind(value)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound { entity: "server" });
        }
        Ok(())
    }
}
