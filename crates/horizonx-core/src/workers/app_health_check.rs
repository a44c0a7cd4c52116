// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Injects per-server `app_health_check` jobs carrying the server's
//! application id list.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::{JobType, ListOptions, ServerListOptions};
use crate::services::{ApplicationService, JobService, ServerService};
use crate::workers::Worker;

pub struct AppHealthCheckWorker {
    jobs: Arc<JobService>,
    servers: Arc<ServerService>,
    applications: Arc<ApplicationService>,
}

impl AppHealthCheckWorker {
    pub fn new(
        jobs: Arc<JobService>,
        servers: Arc<ServerService>,
        applications: Arc<ApplicationService>,
    ) -> Self {
        Self {
            jobs,
            servers,
            applications,
        }
    }
}

#[async_trait]
impl Worker for AppHealthCheckWorker {
    fn name(&self) -> &'static str {
        "app_health_check"
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
            let app_ids = match self.applications.ids_for_server(server.id).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(server_id = %server.id, error = %e, "failed to list applications");
                    continue;
                }
            };
            if app_ids.is_empty() {
                continue;
            }

            if let Err(e) = self
                .jobs
                .create_for_server(
                    JobType::AppHealthCheck,
                    server.id,
                    serde_json::json!({ "application_ids": app_ids }),
                )
                .await
            {
                warn!(server_id = %server.id, error = %e, "failed to create health check job");
            }
        }

        Ok(())
    }
}
