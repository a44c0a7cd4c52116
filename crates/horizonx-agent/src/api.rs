// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP client for the control plane's agent endpoints.
//!
//! Every call carries `Authorization: Bearer <server_uuid>.<secret>`.
//! Side-effect posts (logs, metrics, health, commit info) are best-effort;
//! the worker logs failures and moves on.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use horizonx_core::domain::{
    ApplicationHealthReport, Job, JobStatus, LogEmitRequest, Metrics,
};

use crate::config::Config;
use crate::error::{AgentError, Result};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Control-plane response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    authorization: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            authorization: config.credentials().authorization_header(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AgentError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(AgentError::Other(format!(
                "unexpected status {} from control plane",
                response.status()
            )));
        }
        let envelope: Envelope<T> = response.json().await?;
        envelope
            .data
            .ok_or_else(|| AgentError::Other("response envelope carried no data".to_string()))
    }

    async fn check_empty(&self, response: reqwest::Response) -> Result<()> {
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AgentError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(AgentError::Other(format!(
                "unexpected status {} from control plane",
                response.status()
            )));
        }
        Ok(())
    }

    /// `GET /jobs/pending`
    pub async fn pending_jobs(&self) -> Result<Vec<Job>> {
        let response = self
            .http
            .get(self.url("/jobs/pending"))
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .send()
            .await?;
        self.check(response).await
    }

    /// `POST /jobs/{id}/start`
    pub async fn start_job(&self, job_id: i64) -> Result<Job> {
        let response = self
            .http
            .post(self.url(&format!("/jobs/{}/start", job_id)))
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .send()
            .await?;
        self.check(response).await
    }

    /// `POST /jobs/{id}/finish`
    pub async fn finish_job(&self, job_id: i64, status: JobStatus) -> Result<Job> {
        let response = self
            .http
            .post(self.url(&format!("/jobs/{}/finish", job_id)))
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;
        self.check(response).await
    }

    /// `POST /logs`
    pub async fn send_log(&self, log: &LogEmitRequest) -> Result<()> {
        let response = self
            .http
            .post(self.url("/logs"))
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(log)
            .send()
            .await?;
        self.check_empty(response).await
    }

    /// `POST /metrics`
    pub async fn send_metrics(&self, sample: &Metrics) -> Result<()> {
        let response = self
            .http
            .post(self.url("/metrics"))
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(sample)
            .send()
            .await?;
        self.check_empty(response).await
    }

    /// `POST /applications/health`
    pub async fn send_app_healths(&self, reports: &[ApplicationHealthReport]) -> Result<()> {
        let response = self
            .http
            .post(self.url("/applications/health"))
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(reports)
            .send()
            .await?;
        self.check_empty(response).await
    }

    /// `POST /deployments/{id}/commit-info`
    pub async fn send_commit_info(
        &self,
        deployment_id: i64,
        commit_hash: &str,
        commit_message: &str,
    ) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/deployments/{}/commit-info", deployment_id)))
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(&serde_json::json!({
                "commit_hash": commit_hash,
                "commit_message": commit_message,
            }))
            .send()
            .await?;
        self.check_empty(response).await
    }
}
