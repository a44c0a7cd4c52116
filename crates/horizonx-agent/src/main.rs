// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HorizonX host agent.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use horizonx_agent::api::ApiClient;
use horizonx_agent::collector::Collector;
use horizonx_agent::collector::reader::LinuxReader;
use horizonx_agent::config::Config;
use horizonx_agent::executor::Executor;
use horizonx_agent::session::{self, Session};
use horizonx_agent::worker::JobWorker;
use horizonx_core::registry::MemoryStreamRegistry;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
                format!("horizonx_agent={}", level).into()
            }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        server_id = %config.server_id,
        api_url = %config.api_url,
        work_dir = %config.work_dir.display(),
        "starting agent"
    );

    let api = match ApiClient::new(&config) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            error!("failed to build api client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let reader = Arc::new(LinuxReader::new());
    let registry = Arc::new(MemoryStreamRegistry::new());
    let (metrics_tx, metrics_rx) = session::metrics_channel();

    let collector = Arc::new(Collector::new(
        config.server_id,
        reader.clone(),
        registry,
        metrics_tx,
    ));

    let executor = Arc::new(Executor::new(&config.work_dir, collector.clone()));
    if let Err(e) = executor.preflight().await {
        // Missing docker/compose/git cannot be retried into existence.
        error!("preflight failed: {}", e);
        return ExitCode::FAILURE;
    }
    info!("preflight passed");

    let worker = Arc::new(JobWorker::new(api, executor));
    let mut agent_session = Session::new(config, reader, metrics_rx);

    let collector_shutdown = collector.shutdown_handle();
    let worker_shutdown = worker.shutdown_handle();
    let session_shutdown = agent_session.shutdown_handle();

    let collector_task = tokio::spawn(async move { collector.run().await });
    let worker_task = tokio::spawn(async move { worker.run().await });

    let exit = tokio::select! {
        result = agent_session.run() => {
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("fatal: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            session_shutdown.notify_waiters();
            ExitCode::SUCCESS
        }
    };

    // Stop the loops and let the collector flush its buffer.
    collector_shutdown.notify_waiters();
    worker_shutdown.notify_waiters();
    let _ = tokio::join!(collector_task, worker_task);

    info!("agent stopped");
    exit
}
