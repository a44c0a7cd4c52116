// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Listener mapping deploy-job lifecycle events to deployment transitions.
//!
//! Subscribed to `job_started` and `job_finished`. Bus delivery is
//! synchronous, so each handler hands the database work off to a spawned
//! task under a fresh 5 s timeout. Handlers never propagate errors; a
//! publish never waits on them.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::bus::{Bus, topics};
use crate::domain::{DeploymentStatus, Event, JobStatus, JobType};
use crate::services::DeploymentService;

/// Timeout for each secondary deployment write.
const UPDATE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DeploymentListener {
    deployments: Arc<DeploymentService>,
}

impl DeploymentListener {
    pub fn new(deployments: Arc<DeploymentService>) -> Self {
        Self { deployments }
    }

    /// Wire the listener onto the bus. Must run inside a tokio runtime; the
    /// handlers spawn onto the current runtime.
    pub fn register(self: &Arc<Self>, bus: &Bus) {
        let handle = tokio::runtime::Handle::current();

        let listener = self.clone();
        let spawn = handle.clone();
        bus.subscribe(topics::JOB_STARTED, move |event| {
            if let Event::JobStarted(job) = event {
                if job.job_type != JobType::AppDeploy {
                    return;
                }
                let Some(deployment_id) = job.deployment_id else {
                    return;
                };
                let listener = listener.clone();
                spawn.spawn(async move {
                    listener
                        .transition(deployment_id, DeploymentStatus::Deploying)
                        .await;
                });
            }
        });

        let listener = self.clone();
        bus.subscribe(topics::JOB_FINISHED, move |event| {
            if let Event::JobFinished(finished) = event {
                if finished.job.job_type != JobType::AppDeploy {
                    return;
                }
                let Some(deployment_id) = finished.job.deployment_id else {
                    return;
                };
                let status = match finished.status {
                    JobStatus::Success => DeploymentStatus::Success,
                    _ => DeploymentStatus::Failed,
                };
                let listener = listener.clone();
                handle.spawn(async move {
                    listener.transition(deployment_id, status).await;
                });
            }
        });
    }

    async fn transition(&self, deployment_id: i64, status: DeploymentStatus) {
        let result = tokio::time::timeout(
            UPDATE_TIMEOUT,
            self.deployments.update_status(deployment_id, status),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                debug!(deployment_id, status = status.as_str(), "deployment transitioned");
            }
            Ok(Err(e)) => {
                error!(deployment_id, status = status.as_str(), error = %e,
                    "failed to transition deployment");
            }
            Err(_) => {
                error!(deployment_id, status = status.as_str(), "deployment transition timed out");
            }
        }
    }
}
