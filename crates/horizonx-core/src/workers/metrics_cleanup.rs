// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Daily cleanup of metric samples older than the retention window.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::domain::{ListOptions, ServerListOptions};
use crate::services::{MetricsService, ServerService};
use crate::workers::Worker;

/// Samples older than this are dropped.
const RETENTION_DAYS: i64 = 7;

pub struct MetricsCleanupWorker {
    metrics: Arc<MetricsService>,
    servers: Arc<ServerService>,
}

impl MetricsCleanupWorker {
    pub fn new(metrics: Arc<MetricsService>, servers: Arc<ServerService>) -> Self {
        Self { metrics, servers }
    }
}

#[async_trait]
impl Worker for MetricsCleanupWorker {
    fn name(&self) -> &'static str {
        "metrics_cleanup"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let servers = self
            .servers
            .list(ServerListOptions {
                list: ListOptions::default(),
                is_online: Some(true),
            })
            .await?;

        let cutoff = Utc::now() - Duration::days(RETENTION_DAYS);

        for server in &servers.data {
            match self.metrics.cleanup(server.id, cutoff).await {
                Ok(deleted) => {
                    info!(server_id = %server.id, deleted, "cleaned up old metric samples");
                }
                Err(e) => {
                    warn!(server_id = %server.id, error = %e, "failed to clean up metrics");
                }
            }
        }

        Ok(())
    }
}
