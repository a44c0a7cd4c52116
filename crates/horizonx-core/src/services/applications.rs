// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application service: CRUD, health updates, and deploy triggering.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::bus::{Bus, topics};
use crate::domain::events::ApplicationEvent;
use crate::domain::{
    Application, ApplicationHealthReport, ApplicationSaveRequest, Deployment,
    DeploymentCreateRequest, Event, Job, JobStatus, JobType,
};
use crate::error::{CoreError, Result};
use crate::persistence::ApplicationRepository;
use crate::services::{DeploymentService, JobService};

pub struct ApplicationService {
    repo: Arc<dyn ApplicationRepository>,
    deployments: Arc<DeploymentService>,
    jobs: Arc<JobService>,
    bus: Arc<Bus>,
}

impl ApplicationService {
    pub fn new(
        repo: Arc<dyn ApplicationRepository>,
        deployments: Arc<DeploymentService>,
        jobs: Arc<JobService>,
        bus: Arc<Bus>,
    ) -> Self {
        Self {
            repo,
            deployments,
            jobs,
            bus,
        }
    }

    pub async fn list(&self, server_id: Option<Uuid>) -> Result<Vec<Application>> {
        self.repo.list(server_id).await
    }

    pub async fn get(&self, application_id: i64) -> Result<Application> {
        self.repo.get_by_id(application_id).await
    }

    pub async fn ids_for_server(&self, server_id: Uuid) -> Result<Vec<i64>> {
        self.repo.ids_for_server(server_id).await
    }

    pub async fn create(&self, req: ApplicationSaveRequest) -> Result<Application> {
        Self::validate(&req, true)?;
        let created = self.repo.create(&req).await?;

        self.bus.publish(
            topics::APPLICATION_CREATED,
            &Event::ApplicationCreated(ApplicationEvent {
                application_id: created.id,
                server_id: created.server_id,
                status: created.health,
            }),
        );

        Ok(created)
    }

    pub async fn update(&self, application_id: i64, req: ApplicationSaveRequest) -> Result<()> {
        Self::validate(&req, false)?;
        self.repo.update(application_id, &req).await
    }

    pub async fn delete(&self, application_id: i64) -> Result<()> {
        self.repo.soft_delete(application_id).await
    }

    /// Apply one agent-reported health observation.
    pub async fn update_health(&self, report: &ApplicationHealthReport) -> Result<()> {
        let app = self.repo.get_by_id(report.application_id).await?;
        self.repo
            .update_health(report.application_id, report.status)
            .await?;

        self.bus.publish(
            topics::APPLICATION_STATUS_CHANGED,
            &Event::ApplicationStatusChanged(ApplicationEvent {
                application_id: report.application_id,
                server_id: app.server_id,
                status: report.status,
            }),
        );
        Ok(())
    }

    /// Apply a batch of health observations. Individual failures are logged
    /// and skipped; agents report best-effort.
    pub async fn apply_health_reports(&self, reports: &[ApplicationHealthReport]) {
        for report in reports {
            if let Err(e) = self.update_health(report).await {
                warn!(
                    application_id = report.application_id,
                    error = %e,
                    "failed to apply health report"
                );
            }
        }
    }

    /// Trigger a deployment: one `pending` deployment row plus the
    /// `app_deploy` job the owning agent will pick up.
    pub async fn deploy(
        &self,
        application_id: i64,
        branch: Option<String>,
        deployed_by: i64,
    ) -> Result<(Deployment, Job)> {
        let app = self.repo.get_by_id(application_id).await?;
        let branch = branch.unwrap_or_else(|| app.branch.clone());

        let deployment = self
            .deployments
            .create(DeploymentCreateRequest {
                application_id: app.id,
                branch: branch.clone(),
                deployed_by,
            })
            .await?;

        let payload = serde_json::json!({
            "application_id": app.id,
            "repo_url": app.repo_url,
            "branch": branch,
            "env_vars": app.env_vars,
        });

        let job = self
            .jobs
            .create(Job {
                id: 0,
                trace_id: Uuid::new_v4(),
                job_type: JobType::AppDeploy,
                server_id: app.server_id,
                application_id: Some(app.id),
                deployment_id: Some(deployment.id),
                payload,
                status: JobStatus::Pending,
                created_at: Utc::now(),
                started_at: None,
                finished_at: None,
                logs: Vec::new(),
            })
            .await?;

        self.bus.publish(
            topics::APPLICATION_DEPLOYED,
            &Event::ApplicationDeployed(ApplicationEvent {
                application_id: app.id,
                server_id: app.server_id,
                status: app.health,
            }),
        );

        Ok((deployment, job))
    }

    /// Create the control job for start/stop/restart operations.
    pub async fn control(&self, application_id: i64, job_type: JobType) -> Result<Job> {
        if !matches!(
            job_type,
            JobType::AppStart | JobType::AppStop | JobType::AppRestart
        ) {
            return Err(CoreError::validation("type", "not a control job"));
        }

        let app = self.repo.get_by_id(application_id).await?;
        self.jobs
            .create(Job {
                id: 0,
                trace_id: Uuid::new_v4(),
                job_type,
                server_id: app.server_id,
                application_id: Some(app.id),
                deployment_id: None,
                payload: serde_json::json!({ "application_id": app.id }),
                status: JobStatus::Pending,
                created_at: Utc::now(),
                started_at: None,
                finished_at: None,
                logs: Vec::new(),
            })
            .await
    }

    fn validate(req: &ApplicationSaveRequest, require_server: bool) -> Result<()> {
        let mut errors = std::collections::BTreeMap::new();
        if require_server && req.server_id.is_none() {
            errors.insert("server_id".to_string(), "required".to_string());
        }
        if req.name.trim().is_empty() {
            errors.insert("name".to_string(), "required".to_string());
        }
        if req.repo_url.trim().is_empty() {
            errors.insert("repo_url".to_string(), "required".to_string());
        }
        if req.branch.trim().is_empty() {
            errors.insert("branch".to_string(), "required".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation { errors })
        }
    }
}
