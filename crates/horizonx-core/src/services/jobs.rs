// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job lifecycle service.
//!
//! Owns the `pending → running → {success, failed}` state machine. Every
//! mutation publishes its events after the repository write succeeds, so the
//! bus always observes `started` before `finished` for a given job.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::bus::{Bus, topics};
use crate::domain::events::{JobEvent, JobFinished, JobStatusChanged};
use crate::domain::{
    Event, Job, JobListOptions, JobStatus, JobType, ListResult, LogListOptions, Meta,
};
use crate::error::{CoreError, Result};
use crate::persistence::{JobRepository, LogRepository};

pub struct JobService {
    repo: Arc<dyn JobRepository>,
    logs: Arc<dyn LogRepository>,
    bus: Arc<Bus>,
}

impl JobService {
    pub fn new(
        repo: Arc<dyn JobRepository>,
        logs: Arc<dyn LogRepository>,
        bus: Arc<Bus>,
    ) -> Self {
        Self { repo, logs, bus }
    }

    fn job_event(job: &Job) -> JobEvent {
        JobEvent {
            job_id: job.id,
            trace_id: job.trace_id,
            server_id: job.server_id,
            application_id: job.application_id,
            deployment_id: job.deployment_id,
            job_type: job.job_type,
        }
    }

    fn publish_status(&self, job: &Job) {
        self.bus.publish(
            topics::JOB_STATUS_CHANGED,
            &Event::JobStatusChanged(JobStatusChanged {
                job_id: job.id,
                trace_id: job.trace_id,
                status: job.status,
            }),
        );
    }

    pub async fn list(&self, opts: JobListOptions) -> Result<ListResult<Job>> {
        let paginate = opts.list.paginate;
        let (page, limit) = {
            let normalized = opts.list.clone().normalized();
            (normalized.page, normalized.limit)
        };

        let (jobs, total) = self.repo.list(&opts).await?;
        Ok(ListResult {
            data: jobs,
            meta: paginate.then(|| Meta::calculate(total, page, limit)),
        })
    }

    /// Pending jobs for one server, oldest first. Polled by agents.
    pub async fn pending(&self, server_id: Uuid) -> Result<Vec<Job>> {
        self.repo.pending(server_id).await
    }

    /// Fetch one job with its correlated logs attached.
    pub async fn get(&self, job_id: i64) -> Result<Job> {
        let mut job = self.repo.get_by_id(job_id).await?;

        let opts = LogListOptions {
            job_id: Some(job.id),
            ..Default::default()
        };
        let (logs, _) = self.logs.list(&opts).await?;
        job.logs = logs;

        Ok(job)
    }

    /// Create a pending job. A missing trace id is assigned here so every
    /// job belongs to a trace.
    pub async fn create(&self, mut job: Job) -> Result<Job> {
        if job.trace_id.is_nil() {
            job.trace_id = Uuid::new_v4();
        }

        let created = self.repo.create(&job).await?;
        debug!(job_id = created.id, job_type = created.job_type.as_str(), "job created");

        self.bus
            .publish(topics::JOB_CREATED, &Event::JobCreated(Self::job_event(&created)));
        self.publish_status(&created);

        Ok(created)
    }

    /// `pending → running`.
    pub async fn start(&self, job_id: i64) -> Result<Job> {
        let job = self.repo.mark_running(job_id).await?;

        self.bus
            .publish(topics::JOB_STARTED, &Event::JobStarted(Self::job_event(&job)));
        self.publish_status(&job);

        Ok(job)
    }

    /// `running → success|failed`. Rejects non-terminal statuses.
    pub async fn finish(&self, job_id: i64, status: JobStatus) -> Result<Job> {
        if !status.is_terminal() {
            return Err(CoreError::validation(
                "status",
                "must be \"success\" or \"failed\"",
            ));
        }

        let job = self.repo.mark_finished(job_id, status).await?;

        self.bus.publish(
            topics::JOB_FINISHED,
            &Event::JobFinished(JobFinished {
                job: Self::job_event(&job),
                status,
            }),
        );
        self.publish_status(&job);

        Ok(job)
    }

    /// Model a retry as a new pending row carrying the same trace id.
    pub async fn retry(&self, job_id: i64) -> Result<Job> {
        let original = self.repo.get_by_id(job_id).await?;

        let retried = self
            .create(Job {
                id: 0,
                trace_id: original.trace_id,
                job_type: original.job_type,
                server_id: original.server_id,
                application_id: original.application_id,
                deployment_id: original.deployment_id,
                payload: original.payload.clone(),
                status: JobStatus::Pending,
                created_at: original.created_at,
                started_at: None,
                finished_at: None,
                logs: Vec::new(),
            })
            .await?;

        Ok(retried)
    }

    /// Shorthand used by scheduled workers.
    pub async fn create_for_server(
        &self,
        job_type: JobType,
        server_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<Job> {
        self.create(Job {
            id: 0,
            trace_id: Uuid::new_v4(),
            job_type,
            server_id,
            application_id: None,
            deployment_id: None,
            payload,
            status: JobStatus::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            finished_at: None,
            logs: Vec::new(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Log, LogEmitRequest};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeJobRepo {
        jobs: Mutex<Vec<Job>>,
    }

    impl FakeJobRepo {
        fn with(&self, job_id: i64, f: impl FnOnce(&mut Job)) -> Result<Job> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .iter_mut()
                .find(|j| j.id == job_id)
                .ok_or(CoreError::NotFound { entity: "job" })?;
            f(job);
            Ok(job.clone())
        }
    }

    #[async_trait]
    impl JobRepository for FakeJobRepo {
        async fn list(&self, _opts: &JobListOptions) -> Result<(Vec<Job>, i64)> {
            let jobs = self.jobs.lock().unwrap().clone();
            let total = jobs.len() as i64;
            Ok((jobs, total))
        }

        async fn pending(&self, server_id: Uuid) -> Result<Vec<Job>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.server_id == server_id && j.status == JobStatus::Pending)
                .cloned()
                .collect())
        }

        async fn get_by_id(&self, job_id: i64) -> Result<Job> {
            self.with(job_id, |_| {})
        }

        async fn create(&self, job: &Job) -> Result<Job> {
            let mut jobs = self.jobs.lock().unwrap();
            let mut created = job.clone();
            created.id = jobs.len() as i64 + 1;
            created.status = JobStatus::Pending;
            jobs.push(created.clone());
            Ok(created)
        }

        async fn mark_running(&self, job_id: i64) -> Result<Job> {
            self.with(job_id, |job| {
                if job.status == JobStatus::Pending {
                    job.status = JobStatus::Running;
                    job.started_at = Some(Utc::now());
                }
            })
        }

        async fn mark_finished(&self, job_id: i64, status: JobStatus) -> Result<Job> {
            self.with(job_id, |job| {
                if job.status == JobStatus::Running {
                    job.status = status;
                    job.finished_at = Some(Utc::now());
                }
            })
        }
    }

    struct NoLogs;

    #[async_trait]
    impl LogRepository for NoLogs {
        async fn list(&self, _opts: &LogListOptions) -> Result<(Vec<Log>, i64)> {
            Ok((Vec::new(), 0))
        }

        async fn create(&self, _req: &LogEmitRequest) -> Result<Log> {
            Err(CoreError::Database {
                operation: "insert",
                details: "not supported".to_string(),
            })
        }
    }

    fn service() -> (JobService, Arc<Bus>) {
        let bus = Arc::new(Bus::new());
        (
            JobService::new(Arc::new(FakeJobRepo::default()), Arc::new(NoLogs), bus.clone()),
            bus,
        )
    }

    fn pending_job(server_id: Uuid) -> Job {
        Job {
            id: 0,
            trace_id: Uuid::nil(),
            job_type: JobType::AppDeploy,
            server_id,
            application_id: Some(1),
            deployment_id: Some(2),
            payload: serde_json::json!({"branch": "main"}),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            logs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_publishes_events_in_order() {
        let (svc, bus) = service();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for topic in [
            topics::JOB_CREATED,
            topics::JOB_STARTED,
            topics::JOB_FINISHED,
        ] {
            let seen = seen.clone();
            bus.subscribe(topic, move |_| seen.lock().unwrap().push(topic));
        }

        let job = svc.create(pending_job(Uuid::new_v4())).await.unwrap();
        assert!(!job.trace_id.is_nil(), "trace id is assigned on create");

        svc.start(job.id).await.unwrap();
        let finished = svc.finish(job.id, JobStatus::Success).await.unwrap();
        assert_eq!(finished.status, JobStatus::Success);
        assert!(finished.finished_at.is_some());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                topics::JOB_CREATED,
                topics::JOB_STARTED,
                topics::JOB_FINISHED
            ]
        );
    }

    #[tokio::test]
    async fn test_finish_rejects_non_terminal_status() {
        let (svc, _bus) = service();
        let job = svc.create(pending_job(Uuid::new_v4())).await.unwrap();
        svc.start(job.id).await.unwrap();

        let err = svc.finish(job.id, JobStatus::Running).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_finish_is_idempotent_on_replay() {
        let (svc, _bus) = service();
        let job = svc.create(pending_job(Uuid::new_v4())).await.unwrap();
        svc.start(job.id).await.unwrap();

        let first = svc.finish(job.id, JobStatus::Failed).await.unwrap();
        let replay = svc.finish(job.id, JobStatus::Success).await.unwrap();
        assert_eq!(first.status, JobStatus::Failed);
        assert_eq!(replay.status, JobStatus::Failed, "terminal state is sticky");
    }

    #[tokio::test]
    async fn test_retry_carries_trace_id() {
        let (svc, _bus) = service();
        let job = svc.create(pending_job(Uuid::new_v4())).await.unwrap();
        svc.start(job.id).await.unwrap();
        svc.finish(job.id, JobStatus::Failed).await.unwrap();

        let retried = svc.retry(job.id).await.unwrap();
        assert_ne!(retried.id, job.id);
        assert_eq!(retried.trace_id, job.trace_id);
        assert_eq!(retried.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_pending_filters_by_server() {
        let (svc, _bus) = service();
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();

        svc.create(pending_job(mine)).await.unwrap();
        svc.create(pending_job(other)).await.unwrap();

        let pending = svc.pending(mine).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].server_id, mine);
    }
}
