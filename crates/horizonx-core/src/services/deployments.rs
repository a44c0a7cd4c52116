// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment service.
//!
//! Status transitions are driven exclusively by the deployment listener; this
//! service owns the writes and the events.

use std::sync::Arc;

use crate::bus::{Bus, topics};
use crate::domain::events::{
    DeploymentCommitInfoReceived, DeploymentCreated, DeploymentFinished, DeploymentStarted,
    DeploymentStatusChanged,
};
use crate::domain::{Deployment, DeploymentCreateRequest, DeploymentStatus, Event};
use crate::error::{CoreError, Result};
use crate::persistence::DeploymentRepository;

pub struct DeploymentService {
    repo: Arc<dyn DeploymentRepository>,
    bus: Arc<Bus>,
}

impl DeploymentService {
    pub fn new(repo: Arc<dyn DeploymentRepository>, bus: Arc<Bus>) -> Self {
        Self { repo, bus }
    }

    pub async fn list(&self, application_id: Option<i64>, limit: i64) -> Result<Vec<Deployment>> {
        self.repo.list(application_id, limit).await
    }

    pub async fn get(&self, deployment_id: i64) -> Result<Deployment> {
        self.repo.get_by_id(deployment_id).await
    }

    pub async fn create(&self, req: DeploymentCreateRequest) -> Result<Deployment> {
        if req.branch.trim().is_empty() {
            return Err(CoreError::validation("branch", "required"));
        }

        let deployment = Deployment {
            id: 0,
            application_id: req.application_id,
            branch: req.branch,
            commit_hash: None,
            commit_message: None,
            status: DeploymentStatus::Pending,
            triggered_at: chrono::Utc::now(),
            started_at: None,
            finished_at: None,
            deployed_by: req.deployed_by,
        };
        let created = self.repo.create(&deployment).await?;

        self.bus.publish(
            topics::DEPLOYMENT_CREATED,
            &Event::DeploymentCreated(DeploymentCreated {
                deployment_id: created.id,
                application_id: created.application_id,
                deployed_by: created.deployed_by,
                triggered_at: created.triggered_at,
            }),
        );
        self.publish_status(&created);

        Ok(created)
    }

    /// Move a deployment to a new status, emitting the transition events.
    pub async fn update_status(
        &self,
        deployment_id: i64,
        status: DeploymentStatus,
    ) -> Result<Deployment> {
        let updated = self.repo.update_status(deployment_id, status).await?;

        match status {
            DeploymentStatus::Deploying => {
                self.bus.publish(
                    topics::DEPLOYMENT_STARTED,
                    &Event::DeploymentStarted(DeploymentStarted {
                        deployment_id: updated.id,
                        application_id: updated.application_id,
                        started_at: updated.started_at.unwrap_or(updated.triggered_at),
                    }),
                );
            }
            DeploymentStatus::Success | DeploymentStatus::Failed => {
                let finished = DeploymentFinished {
                    deployment_id: updated.id,
                    application_id: updated.application_id,
                    status,
                    finished_at: updated.finished_at.unwrap_or(updated.triggered_at),
                };
                self.bus.publish(
                    topics::DEPLOYMENT_FINISHED,
                    &Event::DeploymentFinished(finished.clone()),
                );
                self.bus.publish(
                    topics::DEPLOYMENT_COMPLETED,
                    &Event::DeploymentCompleted(finished),
                );
            }
            DeploymentStatus::Pending => {}
        }
        self.publish_status(&updated);

        Ok(updated)
    }

    /// Record the commit the agent checked out for this deployment.
    pub async fn update_commit_info(
        &self,
        deployment_id: i64,
        commit_hash: &str,
        commit_message: &str,
    ) -> Result<Deployment> {
        let updated = self
            .repo
            .update_commit_info(deployment_id, commit_hash, commit_message)
            .await?;

        self.bus.publish(
            topics::DEPLOYMENT_COMMIT_INFO_RECEIVED,
            &Event::DeploymentCommitInfoReceived(DeploymentCommitInfoReceived {
                deployment_id: updated.id,
                application_id: updated.application_id,
                commit_hash: updated.commit_hash.clone().unwrap_or_default(),
                commit_message: updated.commit_message.clone().unwrap_or_default(),
            }),
        );

        Ok(updated)
    }

    fn publish_status(&self, deployment: &Deployment) {
        self.bus.publish(
            topics::DEPLOYMENT_STATUS_CHANGED,
            &Event::DeploymentStatusChanged(DeploymentStatusChanged {
                deployment_id: deployment.id,
                application_id: deployment.application_id,
                status: deployment.status,
            }),
        );
    }
}
