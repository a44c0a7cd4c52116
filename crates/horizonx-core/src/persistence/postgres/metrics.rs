// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Metrics repository over PostgreSQL.
//!
//! Samples arrive in batches from the metrics service flusher; each nested
//! block is stored as JSONB so the schema survives sampler evolution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Metrics;
use crate::error::Result;
use crate::persistence::MetricsRepository;

pub struct PgMetricsRepository {
    pool: PgPool,
}

impl PgMetricsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricsRepository for PgMetricsRepository {
    async fn bulk_insert(&self, samples: &[Metrics]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for sample in samples {
            sqlx::query(
                "INSERT INTO metrics (server_id, recorded_at, cpu, gpu, memory, disk, network, \
                 uptime_seconds) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (server_id, recorded_at) DO NOTHING",
            )
            .bind(sample.server_id)
            .bind(sample.recorded_at)
            .bind(serde_json::to_value(&sample.cpu)?)
            .bind(serde_json::to_value(&sample.gpu)?)
            .bind(serde_json::to_value(&sample.memory)?)
            .bind(serde_json::to_value(&sample.disk)?)
            .bind(serde_json::to_value(&sample.network)?)
            .bind(sample.uptime_seconds as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn cleanup(&self, server_id: Uuid, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM metrics WHERE server_id = $1 AND recorded_at < $2")
            .bind(server_id)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
