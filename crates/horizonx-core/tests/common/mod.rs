// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared in-memory fakes for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use horizonx_core::domain::{
    Deployment, DeploymentStatus, OsInfo, Server, ServerListOptions,
};
use horizonx_core::error::{CoreError, Result};
use horizonx_core::persistence::{DeploymentRepository, ServerRepository};

/// Server repository backed by a vec.
#[derive(Default)]
pub struct FakeServerRepo {
    pub servers: Mutex<Vec<Server>>,
}

#[async_trait]
impl ServerRepository for FakeServerRepo {
    async fn list(&self, _opts: &ServerListOptions) -> Result<(Vec<Server>, i64)> {
        let servers = self.servers.lock().unwrap().clone();
        let total = servers.len() as i64;
        Ok((servers, total))
    }

    async fn get_by_id(&self, server_id: Uuid) -> Result<Server> {
        self.servers
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == server_id)
            .cloned()
            .ok_or(CoreError::NotFound { entity: "server" })
    }

    async fn create(&self, server: &Server) -> Result<Server> {
        let mut created = server.clone();
        created.id = Uuid::new_v4();
        self.servers.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update(&self, _id: Uuid, _name: &str, _ip: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn soft_delete(&self, _id: Uuid) -> Result<()> {
        Ok(())
    }

    async fn update_status(&self, server_id: Uuid, is_online: bool) -> Result<()> {
        for server in self.servers.lock().unwrap().iter_mut() {
            if server.id == server_id {
                server.is_online = is_online;
            }
        }
        Ok(())
    }

    async fn update_os_info(&self, _id: Uuid, _os: &OsInfo) -> Result<()> {
        Ok(())
    }
}

/// Deployment repository enforcing the status stamping rules in memory.
#[derive(Default)]
pub struct FakeDeploymentRepo {
    pub deployments: Mutex<Vec<Deployment>>,
}

impl FakeDeploymentRepo {
    fn with(&self, deployment_id: i64, f: impl FnOnce(&mut Deployment)) -> Result<Deployment> {
        let mut deployments = self.deployments.lock().unwrap();
        let deployment = deployments
            .iter_mut()
            .find(|d| d.id == deployment_id)
            .ok_or(CoreError::NotFound {
                entity: "deployment",
            })?;
        f(deployment);
        Ok(deployment.clone())
    }
}

#[async_trait]
impl DeploymentRepository for FakeDeploymentRepo {
    async fn list(&self, application_id: Option<i64>, limit: i64) -> Result<Vec<Deployment>> {
        let deployments = self.deployments.lock().unwrap();
        Ok(deployments
            .iter()
            .filter(|d| application_id.is_none_or(|id| d.application_id == id))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, deployment_id: i64) -> Result<Deployment> {
        self.with(deployment_id, |_| {})
    }

    async fn create(&self, deployment: &Deployment) -> Result<Deployment> {
        let mut deployments = self.deployments.lock().unwrap();
        let mut created = deployment.clone();
        created.id = deployments.len() as i64 + 1;
        created.status = DeploymentStatus::Pending;
        created.triggered_at = Utc::now();
        deployments.push(created.clone());
        Ok(created)
    }

    async fn update_status(
        &self,
        deployment_id: i64,
        status: DeploymentStatus,
    ) -> Result<Deployment> {
        self.with(deployment_id, |deployment| {
            deployment.status = status;
            match status {
                DeploymentStatus::Deploying => {
                    if deployment.started_at.is_none() {
                        deployment.started_at = Some(Utc::now());
                    }
                }
                DeploymentStatus::Success | DeploymentStatus::Failed => {
                    deployment.finished_at = Some(Utc::now());
                }
                DeploymentStatus::Pending => {}
            }
        })
    }

    async fn update_commit_info(
        &self,
        deployment_id: i64,
        commit_hash: &str,
        commit_message: &str,
    ) -> Result<Deployment> {
        self.with(deployment_id, |deployment| {
            deployment.commit_hash = Some(commit_hash.to_string());
            deployment.commit_message = Some(commit_message.to_string());
        })
    }
}
