// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Injects `metrics_collect` jobs for every online server.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::{JobType, ListOptions, ServerListOptions};
use crate::services::{JobService, ServerService};
use crate::workers::Worker;

pub struct MetricsCollectWorker {
    jobs: Arc<JobService>,
    servers: Arc<ServerService>,
}

impl MetricsCollectWorker {
    pub fn new(jobs: Arc<JobService>, servers: Arc<ServerService>) -> Self {
        Self { jobs, servers }
    }
}

#[async_trait]
impl Worker for MetricsCollectWorker {
    fn name(&self) -> &'static str {
        "metrics_collect"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let servers = self
            .servers
            .list(ServerListOptions {
                list: ListOptions::default(),
                is_online: Some(true),
            })
            .await?;

        for server in &servers.data {
            if let Err(e) = self
                .jobs
                .create_for_server(JobType::MetricsCollect, server.id, serde_json::json!({}))
                .await
            {
                warn!(server_id = %server.id, error = %e, "failed to create metrics job");
            }
        }

        Ok(())
    }
}
