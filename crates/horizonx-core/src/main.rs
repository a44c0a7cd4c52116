// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HorizonX control plane server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use horizonx_core::bus::Bus;
use horizonx_core::config::Config;
use horizonx_core::hub::session::AgentIngest;
use horizonx_core::hub::{self, HubRole};
use horizonx_core::persistence::postgres::{
    PgApplicationRepository, PgDeploymentRepository, PgJobRepository, PgLogRepository,
    PgMetricsRepository, PgServerRepository, PgUserRepository,
};
use horizonx_core::registry::MemoryStreamRegistry;
use horizonx_core::services::{
    ApplicationService, AuthService, DeploymentListener, DeploymentService, JobService, LogService,
    MetricsService, ServerService,
};
use horizonx_core::workers::{ManagerServices, Scheduler};
use horizonx_core::{fanout, http, migrations};

/// Grace period for in-flight requests on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        format!("horizonx_core={}", level).into()
    });
    if log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting HorizonX Core");

    let config = Arc::new(Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?);

    info!(
        http_addr = %config.http_addr,
        time_zone = %config.time_zone,
        "Configuration loaded"
    );

    // Database
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    info!("Database connection established");

    migrations::run(&pool).await?;
    info!("Migrations completed");

    // Repositories
    let server_repo = Arc::new(PgServerRepository::new(pool.clone()));
    let user_repo = Arc::new(PgUserRepository::new(pool.clone()));
    let job_repo = Arc::new(PgJobRepository::new(pool.clone()));
    let deployment_repo = Arc::new(PgDeploymentRepository::new(pool.clone()));
    let application_repo = Arc::new(PgApplicationRepository::new(pool.clone()));
    let log_repo = Arc::new(PgLogRepository::new(pool.clone()));
    let metrics_repo = Arc::new(PgMetricsRepository::new(pool.clone()));

    // Event bus and stream registry
    let bus = Arc::new(Bus::new());
    let registry = Arc::new(MemoryStreamRegistry::new());

    // Services
    let servers = Arc::new(ServerService::new(server_repo, bus.clone()));
    let auth = Arc::new(AuthService::new(
        user_repo,
        &config.jwt_secret,
        config.jwt_expiry,
    ));
    let logs = Arc::new(LogService::new(log_repo.clone(), bus.clone()));
    let jobs = Arc::new(JobService::new(job_repo, log_repo, bus.clone()));
    let deployments = Arc::new(DeploymentService::new(deployment_repo, bus.clone()));
    let applications = Arc::new(ApplicationService::new(
        application_repo,
        deployments.clone(),
        jobs.clone(),
        bus.clone(),
    ));
    let metrics = Arc::new(MetricsService::new(metrics_repo, registry, bus.clone()));
    metrics.start();

    // Hubs and event wiring
    let agent_hub = hub::spawn(HubRole::Agent, servers.clone());
    let user_hub = hub::spawn(HubRole::User, servers.clone());
    fanout::register(&bus, user_hub.clone());

    let listener = Arc::new(DeploymentListener::new(deployments.clone()));
    listener.register(&bus);

    // Scheduled workers
    let scheduler = Scheduler::new(config.time_zone);
    horizonx_core::workers::start(
        &scheduler,
        ManagerServices {
            jobs: jobs.clone(),
            servers: servers.clone(),
            metrics: metrics.clone(),
            applications: applications.clone(),
        },
    );

    // HTTP + WebSocket server
    let agent_ingest = Arc::new(AgentIngest {
        servers: servers.clone(),
        metrics: metrics.clone(),
        user_hub: user_hub.clone(),
    });
    let state = http::AppState {
        config: config.clone(),
        servers,
        auth,
        jobs,
        deployments,
        applications,
        logs,
        metrics: metrics.clone(),
        agent_hub,
        user_hub,
        agent_ingest,
    };
    let router = http::router(state);

    let listener_socket = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "HTTP server listening");

    let stop = Arc::new(tokio::sync::Notify::new());
    let stop_signal = stop.clone();
    let mut server = tokio::spawn(async move {
        let result = axum::serve(listener_socket, router)
            .with_graceful_shutdown(async move { stop_signal.notified().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "HTTP server error");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Stop background work, then give in-flight requests and sessions a
    // bounded grace period before tearing the server down.
    scheduler.shutdown_handle().notify_waiters();
    metrics.shutdown_handle().notify_waiters();
    stop.notify_waiters();

    if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
        server.abort();
        info!("grace period elapsed, forcing shutdown");
    }

    pool.close().await;
    info!("Shutdown complete");

    Ok(())
}
