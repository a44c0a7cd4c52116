// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Polling job worker.
//!
//! Every 5 s the worker fetches pending jobs for its server and runs them
//! in order: mark running, execute under a 30 s timeout, drain all
//! side-effect channels, then mark finished. Side-effect delivery is
//! best-effort: failures are logged, never retried, and never change the
//! job's outcome.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use horizonx_core::domain::{Job, JobStatus, LogEmitRequest, LogSource};

use crate::api::ApiClient;
use crate::error::{AgentError, Result};
use crate::executor::{EventDrains, EventSink, Executor};

/// Poll cadence for pending jobs.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Per-job execution budget.
const JOB_TIMEOUT: Duration = Duration::from_secs(30);

pub struct JobWorker {
    api: Arc<ApiClient>,
    executor: Arc<Executor>,
    shutdown: Arc<Notify>,
}

impl JobWorker {
    pub fn new(api: Arc<ApiClient>, executor: Arc<Executor>) -> Self {
        Self {
            api,
            executor,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the poll loop until shutdown.
    pub async fn run(&self) {
        info!(
            poll_interval_secs = POLL_INTERVAL.as_secs(),
            "job worker started, polling for jobs"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("job worker stopped");
                    return;
                }

                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    if let Err(e) = self.poll_and_execute().await {
                        warn!(error = %e, "failed to poll and execute jobs");
                    }
                }
            }
        }
    }

    async fn poll_and_execute(&self) -> Result<()> {
        let jobs = self.api.pending_jobs().await?;
        if jobs.is_empty() {
            return Ok(());
        }
        debug!(count = jobs.len(), "received pending jobs");

        for job in jobs {
            let job_id = job.id;
            if let Err(e) = self.process_job(job).await {
                error!(job_id, error = %e, "failed to process job");
            }
        }
        Ok(())
    }

    async fn process_job(&self, job: Job) -> Result<()> {
        debug!(job_id = job.id, "processing job");

        self.api.start_job(job.id).await?;

        let (sink, drains) = EventSink::channels();
        let drain_task = tokio::spawn(drain_events(self.api.clone(), job.clone(), drains));

        let outcome =
            tokio::time::timeout(JOB_TIMEOUT, self.executor.execute(&job, &sink)).await;
        // Closing the senders lets the drain task run dry and exit.
        drop(sink);

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout),
        };

        // All emitted side effects are flushed before the job finishes.
        if let Err(e) = drain_task.await {
            warn!(job_id = job.id, error = %e, "drain task failed");
        }

        let status = match &result {
            Ok(()) => {
                debug!(job_id = job.id, "job executed successfully");
                JobStatus::Success
            }
            Err(e) => {
                error!(job_id = job.id, error = %e, "job execution failed");
                JobStatus::Failed
            }
        };

        self.api.finish_job(job.id, status).await?;
        result
    }
}

/// Forward emitted side effects to the control plane until the channels run
/// dry. Each kind is independent; all are best-effort.
async fn drain_events(api: Arc<ApiClient>, job: Job, mut drains: EventDrains) {
    let log_api = api.clone();
    let log_job = job.clone();
    let logs = tokio::spawn(async move {
        while let Some(event) = drains.logs.recv().await {
            let request = LogEmitRequest {
                timestamp: event.timestamp,
                level: event.level,
                source: LogSource::Agent,
                action: event.action,
                trace_id: log_job.trace_id,
                job_id: Some(log_job.id),
                server_id: Some(log_job.server_id),
                application_id: log_job.application_id,
                deployment_id: log_job.deployment_id,
                message: event.message,
                context: event.context,
            };
            if let Err(e) = log_api.send_log(&request).await {
                error!(job_id = log_job.id, error = %e, "failed to send log");
            }
        }
    });

    let commit_api = api.clone();
    let commits = tokio::spawn(async move {
        while let Some(commit) = drains.commits.recv().await {
            if let Err(e) = commit_api
                .send_commit_info(commit.deployment_id, &commit.hash, &commit.message)
                .await
            {
                error!(
                    deployment_id = commit.deployment_id,
                    error = %e,
                    "failed to send commit info"
                );
            }
        }
    });

    let metrics_api = api.clone();
    let metrics = tokio::spawn(async move {
        while let Some(sample) = drains.metrics.recv().await {
            if let Err(e) = metrics_api.send_metrics(&sample).await {
                error!(error = %e, "failed to send metrics");
            }
        }
    });

    let healths = tokio::spawn(async move {
        while let Some(reports) = drains.healths.recv().await {
            if let Err(e) = api.send_app_healths(&reports).await {
                error!(error = %e, "failed to send application health reports");
            }
        }
    });

    let _ = tokio::join!(logs, commits, metrics, healths);
}
