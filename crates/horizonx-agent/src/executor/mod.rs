// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job execution: dispatch by job type to git / compose operations.
//!
//! Side effects stream out through an [`EventSink`] of bounded channels:
//! logs (200), commit info (10), metrics and health batches. Emission is
//! best-effort; a full channel drops with a warning. The worker drains all
//! channels before finishing the job.
//!
//! Deploy steps progress `git_clone → build_prepare → docker_stop →
//! docker_build`; a failing step emits a `fatal` log carrying the cause in
//! addition to the propagated error, so operators always have a readable
//! terminal line.

pub mod command;
pub mod compose;
pub mod git;
pub mod health;

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use horizonx_core::domain::{
    ApplicationHealthReport, Job, JobType, LogAction, LogContext, LogLevel, LogStep, LogStream,
    Metrics,
};

use crate::collector::Collector;
use crate::error::{AgentError, Result};
use crate::executor::command::StreamHandler;
use crate::executor::compose::ComposeManager;
use crate::executor::git::GitManager;

/// One log line produced during execution.
#[derive(Debug, Clone)]
pub struct LogEmitted {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub action: LogAction,
    pub message: String,
    pub context: Option<LogContext>,
}

/// Commit details captured during a deploy.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub deployment_id: i64,
    pub hash: String,
    pub message: String,
}

/// Bounded side-effect channels between executor and worker.
#[derive(Clone)]
pub struct EventSink {
    logs: mpsc::Sender<LogEmitted>,
    commits: mpsc::Sender<CommitInfo>,
    metrics: mpsc::Sender<Metrics>,
    healths: mpsc::Sender<Vec<ApplicationHealthReport>>,
}

/// Receiver halves handed to the worker's drain tasks.
pub struct EventDrains {
    pub logs: mpsc::Receiver<LogEmitted>,
    pub commits: mpsc::Receiver<CommitInfo>,
    pub metrics: mpsc::Receiver<Metrics>,
    pub healths: mpsc::Receiver<Vec<ApplicationHealthReport>>,
}

impl EventSink {
    /// Channel capacities: logs 200, commits 10, metrics/health 4.
    pub fn channels() -> (Self, EventDrains) {
        let (logs_tx, logs_rx) = mpsc::channel(200);
        let (commits_tx, commits_rx) = mpsc::channel(10);
        let (metrics_tx, metrics_rx) = mpsc::channel(4);
        let (healths_tx, healths_rx) = mpsc::channel(4);
        (
            Self {
                logs: logs_tx,
                commits: commits_tx,
                metrics: metrics_tx,
                healths: healths_tx,
            },
            EventDrains {
                logs: logs_rx,
                commits: commits_rx,
                metrics: metrics_rx,
                healths: healths_rx,
            },
        )
    }

    fn emit_log(&self, log: LogEmitted) {
        if self.logs.try_send(log).is_err() {
            warn!("log channel full, line dropped");
        }
    }

    fn emit_commit(&self, commit: CommitInfo) {
        if self.commits.try_send(commit).is_err() {
            warn!("commit channel full, commit info dropped");
        }
    }

    fn emit_metrics(&self, sample: Metrics) {
        if self.metrics.try_send(sample).is_err() {
            warn!("metrics channel full, sample dropped");
        }
    }

    fn emit_healths(&self, reports: Vec<ApplicationHealthReport>) {
        if self.healths.try_send(reports).is_err() {
            warn!("health channel full, batch dropped");
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeployPayload {
    application_id: i64,
    repo_url: String,
    branch: String,
    #[serde(default)]
    env_vars: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ControlPayload {
    application_id: i64,
}

#[derive(Debug, Deserialize)]
struct HealthCheckPayload {
    #[serde(default)]
    application_ids: Vec<i64>,
}

pub struct Executor {
    compose: ComposeManager,
    git: GitManager,
    collector: Arc<Collector>,
    work_dir: std::path::PathBuf,
}

impl Executor {
    pub fn new(work_dir: &Path, collector: Arc<Collector>) -> Self {
        Self {
            compose: ComposeManager::new(work_dir),
            git: GitManager::new(work_dir),
            collector,
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// Verify runtime dependencies and create the working directory. A
    /// failure here is fatal for the agent.
    pub async fn preflight(&self) -> Result<()> {
        if !self.compose.is_docker_installed().await {
            return Err(AgentError::MissingDependency("docker"));
        }
        if !self.compose.is_compose_available().await {
            return Err(AgentError::MissingDependency("docker compose"));
        }
        if !self.git.is_installed().await {
            return Err(AgentError::MissingDependency("git"));
        }

        std::fs::create_dir_all(&self.work_dir)?;
        Ok(())
    }

    /// Execute one job, streaming side effects into the sink.
    pub async fn execute(&self, job: &Job, sink: &EventSink) -> Result<()> {
        debug!(job_id = job.id, job_type = job.job_type.as_str(), "executing job");

        match job.job_type {
            JobType::MetricsCollect => {
                if let Some(sample) = self.collector.latest() {
                    sink.emit_metrics(sample);
                }
                Ok(())
            }
            JobType::AppHealthCheck => self.health_check(job, sink).await,
            JobType::AppDeploy => self.deploy(job, sink).await,
            JobType::AppStart => {
                let payload: ControlPayload = serde_json::from_value(job.payload.clone())?;
                let handler =
                    self.stream_handler(sink, LogAction::AppStart, LogStep::DockerStart);
                self.run_step(
                    sink,
                    LogAction::AppStart,
                    LogStep::DockerStart,
                    self.compose.start(payload.application_id, Some(handler)),
                )
                .await?;
                Ok(())
            }
            JobType::AppStop => {
                let payload: ControlPayload = serde_json::from_value(job.payload.clone())?;
                let handler = self.stream_handler(sink, LogAction::AppStop, LogStep::DockerStop);
                self.run_step(
                    sink,
                    LogAction::AppStop,
                    LogStep::DockerStop,
                    self.compose.stop(payload.application_id, Some(handler)),
                )
                .await?;
                Ok(())
            }
            JobType::AppRestart => {
                let payload: ControlPayload = serde_json::from_value(job.payload.clone())?;
                let handler =
                    self.stream_handler(sink, LogAction::AppRestart, LogStep::DockerRestart);
                self.run_step(
                    sink,
                    LogAction::AppRestart,
                    LogStep::DockerRestart,
                    self.compose.restart(payload.application_id, Some(handler)),
                )
                .await?;
                Ok(())
            }
            JobType::AgentInit => Err(AgentError::Other(format!(
                "job type {} is not executable on the agent",
                job.job_type.as_str()
            ))),
        }
    }

    async fn deploy(&self, job: &Job, sink: &EventSink) -> Result<()> {
        let payload: DeployPayload = serde_json::from_value(job.payload.clone())?;
        let app_id = payload.application_id;
        let action = LogAction::AppDeploy;

        std::fs::create_dir_all(self.work_dir.join(format!("app-{}", app_id)))?;

        // Fetch sources.
        let handler = self.stream_handler(sink, action, LogStep::GitClone);
        self.run_step(
            sink,
            action,
            LogStep::GitClone,
            self.git
                .clone_or_pull(app_id, &payload.repo_url, &payload.branch, Some(handler)),
        )
        .await?;

        // Report what was checked out, when the job belongs to a deployment.
        if let Some(deployment_id) = job.deployment_id {
            let hash = self
                .run_step(
                    sink,
                    action,
                    LogStep::BuildPrepare,
                    self.git.current_commit(app_id),
                )
                .await?;
            let message = self
                .run_step(
                    sink,
                    action,
                    LogStep::BuildPrepare,
                    self.git.commit_message(app_id),
                )
                .await?;

            sink.emit_commit(CommitInfo {
                deployment_id,
                hash: hash.chars().take(8).collect(),
                message,
            });
        }

        // A deployable checkout must carry a compose file.
        if let Err(e) = self.compose.validate_compose_file(app_id) {
            self.fatal(sink, action, LogStep::BuildPrepare, &e);
            return Err(e);
        }

        if !payload.env_vars.is_empty() {
            if let Err(e) = self.compose.write_env_file(app_id, &payload.env_vars) {
                self.fatal(sink, action, LogStep::BuildPrepare, &e);
                return Err(e);
            }
        }

        // Replace the running stack.
        let handler = self.stream_handler(sink, action, LogStep::DockerStop);
        self.run_step(
            sink,
            action,
            LogStep::DockerStop,
            self.compose.down(app_id, false, Some(handler)),
        )
        .await?;

        let handler = self.stream_handler(sink, action, LogStep::DockerBuild);
        self.run_step(
            sink,
            action,
            LogStep::DockerBuild,
            self.compose.up(app_id, true, true, Some(handler)),
        )
        .await?;

        Ok(())
    }

    async fn health_check(&self, job: &Job, sink: &EventSink) -> Result<()> {
        let payload: HealthCheckPayload = serde_json::from_value(job.payload.clone())?;

        let mut reports = Vec::with_capacity(payload.application_ids.len());
        for app_id in payload.application_ids {
            let status = match self.compose.ps_json(app_id).await {
                Ok(output) => health::aggregate_status(&health::parse_ps_output(&output)),
                Err(e) => {
                    debug!(application_id = app_id, error = %e, "compose ps failed");
                    horizonx_core::domain::ApplicationStatus::Failed
                }
            };
            reports.push(ApplicationHealthReport {
                application_id: app_id,
                status,
            });
        }

        sink.emit_healths(reports);
        Ok(())
    }

    /// Run one step; on failure, emit the fatal terminal line and propagate.
    async fn run_step<T>(
        &self,
        sink: &EventSink,
        action: LogAction,
        step: LogStep,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match operation.await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.fatal(sink, action, step, &e);
                Err(e)
            }
        }
    }

    fn fatal(&self, sink: &EventSink, action: LogAction, step: LogStep, error: &AgentError) {
        let message = error.to_string();
        sink.emit_log(LogEmitted {
            timestamp: Utc::now(),
            level: LogLevel::Fatal,
            action,
            message: message.clone(),
            context: Some(LogContext {
                step: Some(step),
                stream: Some(LogStream::Stderr),
                line: Some(message),
                ..Default::default()
            }),
        });
    }

    /// Per-line streaming handler turning process output into log events.
    fn stream_handler(&self, sink: &EventSink, action: LogAction, step: LogStep) -> StreamHandler {
        let sink = sink.clone();
        Arc::new(move |line: &str, stream: LogStream| {
            let level = match stream {
                LogStream::Stdout => LogLevel::Info,
                LogStream::Stderr => LogLevel::Error,
            };
            sink.emit_log(LogEmitted {
                timestamp: Utc::now(),
                level,
                action,
                message: line.to_string(),
                context: Some(LogContext {
                    step: Some(step),
                    stream: Some(stream),
                    line: Some(line.to_string()),
                    ..Default::default()
                }),
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::reader::LinuxReader;
    use horizonx_core::domain::JobStatus;
    use horizonx_core::registry::MemoryStreamRegistry;
    use uuid::Uuid;

    fn executor(work_dir: &Path) -> Executor {
        let (tx, _rx) = mpsc::channel(4);
        let collector = Arc::new(Collector::new(
            Uuid::new_v4(),
            Arc::new(LinuxReader::new()),
            Arc::new(MemoryStreamRegistry::new()),
            tx,
        ));
        Executor::new(work_dir, collector)
    }

    fn job(job_type: JobType, payload: serde_json::Value) -> Job {
        Job {
            id: 1,
            trace_id: Uuid::new_v4(),
            job_type,
            server_id: Uuid::new_v4(),
            application_id: Some(1),
            deployment_id: None,
            payload,
            status: JobStatus::Running,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            finished_at: None,
            logs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_deploy_rejects_malformed_payload() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());
        let (sink, _drains) = EventSink::channels();

        let job = job(JobType::AppDeploy, serde_json::json!({"nope": true}));
        let err = executor.execute(&job, &sink).await.unwrap_err();
        assert!(matches!(err, AgentError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_agent_init_is_not_executable() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());
        let (sink, _drains) = EventSink::channels();

        let job = job(JobType::AgentInit, serde_json::json!({}));
        assert!(executor.execute(&job, &sink).await.is_err());
    }

    #[tokio::test]
    async fn test_fatal_emits_terminal_log() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());
        let (sink, mut drains) = EventSink::channels();

        let error = AgentError::CommandFailed("boom".to_string());
        executor.fatal(&sink, LogAction::AppDeploy, LogStep::BuildPrepare, &error);

        let log = drains.logs.try_recv().unwrap();
        assert_eq!(log.level, LogLevel::Fatal);
        assert_eq!(log.action, LogAction::AppDeploy);
        assert_eq!(log.context.unwrap().step, Some(LogStep::BuildPrepare));
        assert!(log.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_metrics_collect_emits_nothing_without_samples() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());
        let (sink, mut drains) = EventSink::channels();

        let job = job(JobType::MetricsCollect, serde_json::json!({}));
        executor.execute(&job, &sink).await.unwrap();
        assert!(drains.metrics.try_recv().is_err());
    }
}
