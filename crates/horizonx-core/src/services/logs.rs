// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Log service: append-only writes plus the live `log_received` feed.
//!
//! Lines that belong to a deployment additionally go out as
//! `deployment_logs_updated`, so a client watching one `deployment:<id>`
//! channel sees that deploy's build output in real time without following
//! the global `logs` firehose.

use std::sync::Arc;

use crate::bus::{Bus, topics};
use crate::domain::events::DeploymentLogsUpdated;
use crate::domain::{Event, ListResult, Log, LogEmitRequest, LogListOptions, Meta};
use crate::error::Result;
use crate::persistence::LogRepository;

pub struct LogService {
    repo: Arc<dyn LogRepository>,
    bus: Arc<Bus>,
}

impl LogService {
    pub fn new(repo: Arc<dyn LogRepository>, bus: Arc<Bus>) -> Self {
        Self { repo, bus }
    }

    pub async fn list(&self, opts: LogListOptions) -> Result<ListResult<Log>> {
        let paginate = opts.list.paginate;
        let (page, limit) = {
            let normalized = opts.list.clone().normalized();
            (normalized.page, normalized.limit)
        };

        let (logs, total) = self.repo.list(&opts).await?;
        Ok(ListResult {
            data: logs,
            meta: paginate.then(|| Meta::calculate(total, page, limit)),
        })
    }

    /// Persist one record and push it on the live feeds.
    pub async fn create(&self, req: LogEmitRequest) -> Result<Log> {
        let log = self.repo.create(&req).await?;

        self.bus
            .publish(topics::LOG_RECEIVED, &Event::LogReceived(log.clone()));

        // Deploy output streams to the deployment's own channels while the
        // job is still running, one line at a time.
        if let (Some(deployment_id), Some(application_id)) =
            (log.deployment_id, log.application_id)
        {
            self.bus.publish(
                topics::DEPLOYMENT_LOGS_UPDATED,
                &Event::DeploymentLogsUpdated(DeploymentLogsUpdated {
                    deployment_id,
                    application_id,
                    logs: log.message.clone(),
                    is_partial: true,
                }),
            );
        }

        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LogAction, LogLevel, LogSource};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeLogRepo {
        logs: Mutex<Vec<Log>>,
    }

    #[async_trait]
    impl LogRepository for FakeLogRepo {
        async fn list(&self, _opts: &LogListOptions) -> Result<(Vec<Log>, i64)> {
            let logs = self.logs.lock().unwrap().clone();
            let total = logs.len() as i64;
            Ok((logs, total))
        }

        async fn create(&self, req: &LogEmitRequest) -> Result<Log> {
            let mut logs = self.logs.lock().unwrap();
            let log = Log {
                id: logs.len() as i64 + 1,
                timestamp: req.timestamp,
                level: req.level,
                source: req.source,
                action: req.action,
                trace_id: req.trace_id,
                job_id: req.job_id,
                server_id: req.server_id,
                application_id: req.application_id,
                deployment_id: req.deployment_id,
                message: req.message.clone(),
                context: req.context.clone(),
                created_at: Utc::now(),
            };
            logs.push(log.clone());
            Ok(log)
        }
    }

    fn service() -> (LogService, Arc<Bus>) {
        let bus = Arc::new(Bus::new());
        (
            LogService::new(Arc::new(FakeLogRepo::default()), bus.clone()),
            bus,
        )
    }

    fn emit_request(
        deployment_id: Option<i64>,
        application_id: Option<i64>,
    ) -> LogEmitRequest {
        LogEmitRequest {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            source: LogSource::Agent,
            action: LogAction::AppDeploy,
            trace_id: Uuid::new_v4(),
            job_id: Some(1),
            server_id: Some(Uuid::new_v4()),
            application_id,
            deployment_id,
            message: "Step 3/7 : RUN cargo build".to_string(),
            context: None,
        }
    }

    #[tokio::test]
    async fn test_create_publishes_log_received() {
        let (svc, bus) = service();
        let received = Arc::new(AtomicUsize::new(0));

        let counter = received.clone();
        bus.subscribe(topics::LOG_RECEIVED, move |event| {
            assert!(matches!(event, Event::LogReceived(_)));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        svc.create(emit_request(None, None)).await.unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deployment_log_also_updates_deployment_feed() {
        let (svc, bus) = service();
        let seen = Arc::new(Mutex::new(None));

        let captured = seen.clone();
        bus.subscribe(topics::DEPLOYMENT_LOGS_UPDATED, move |event| {
            if let Event::DeploymentLogsUpdated(e) = event {
                *captured.lock().unwrap() = Some((
                    e.deployment_id,
                    e.application_id,
                    e.logs.clone(),
                    e.is_partial,
                ));
            }
        });

        svc.create(emit_request(Some(9), Some(4))).await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            Some((9, 4, "Step 3/7 : RUN cargo build".to_string(), true))
        );
    }

    #[tokio::test]
    async fn test_logs_without_deployment_skip_deployment_feed() {
        let (svc, bus) = service();
        let updates = Arc::new(AtomicUsize::new(0));

        let counter = updates.clone();
        bus.subscribe(topics::DEPLOYMENT_LOGS_UPDATED, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // No deployment id at all, and a deployment id without its
        // application: neither can be routed to a deployment channel.
        svc.create(emit_request(None, Some(4))).await.unwrap();
        svc.create(emit_request(Some(9), None)).await.unwrap();
        assert_eq!(updates.load(Ordering::SeqCst), 0);
    }
}
