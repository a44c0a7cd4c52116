// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Scheduled control-loop workers.
//!
//! The manager wires three workers onto the scheduler:
//! - `metrics_collect` every 10 s: one collect job per online server
//! - `app_health_check` every 5 min: one health-check job per online server
//! - `metrics_cleanup` daily at 02:00 local: drop samples older than 7 days

pub mod app_health_check;
pub mod metrics_cleanup;
pub mod metrics_collect;
pub mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::services::{ApplicationService, JobService, MetricsService, ServerService};

pub use scheduler::{DailySchedule, Scheduler, Worker};

pub struct ManagerServices {
    pub jobs: Arc<JobService>,
    pub servers: Arc<ServerService>,
    pub metrics: Arc<MetricsService>,
    pub applications: Arc<ApplicationService>,
}

/// Start all scheduled workers.
pub fn start(scheduler: &Scheduler, services: ManagerServices) {
    info!("worker manager started");

    scheduler.run_by_duration(
        Duration::from_secs(10),
        Arc::new(metrics_collect::MetricsCollectWorker::new(
            services.jobs.clone(),
            services.servers.clone(),
        )),
    );

    scheduler.run_by_duration(
        Duration::from_secs(5 * 60),
        Arc::new(app_health_check::AppHealthCheckWorker::new(
            services.jobs.clone(),
            services.servers.clone(),
            services.applications.clone(),
        )),
    );

    scheduler.run_daily(
        DailySchedule { hour: 2, minute: 0 },
        Arc::new(metrics_cleanup::MetricsCleanupWorker::new(
            services.metrics,
            services.servers,
        )),
    );
}
