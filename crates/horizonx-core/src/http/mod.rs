// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP surface: router, shared state, auth, envelope, handlers.
//!
//! Three route groups share one server: agent-authenticated ingest/poll
//! endpoints at the root, user-authenticated CRUD under `/api`, and the two
//! WebSocket upgrade endpoints under `/ws`.

pub mod auth;
pub mod envelope;
pub mod handlers;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::middleware;
use axum::routing::{delete, get, post, put};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::Config;
use crate::hub::HubHandle;
use crate::hub::session::AgentIngest;
use crate::services::{
    ApplicationService, AuthService, DeploymentService, JobService, LogService, MetricsService,
    ServerService,
};

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub servers: Arc<ServerService>,
    pub auth: Arc<AuthService>,
    pub jobs: Arc<JobService>,
    pub deployments: Arc<DeploymentService>,
    pub applications: Arc<ApplicationService>,
    pub logs: Arc<LogService>,
    pub metrics: Arc<MetricsService>,
    pub agent_hub: HubHandle,
    pub user_hub: HubHandle,
    pub agent_ingest: Arc<AgentIngest>,
}

/// Build the full router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let agent_routes = Router::new()
        .route("/metrics", post(handlers::metrics::ingest))
        .route("/logs", post(handlers::logs::ingest))
        .route("/jobs/pending", get(handlers::jobs::pending))
        .route("/jobs/{id}/start", post(handlers::jobs::start))
        .route("/jobs/{id}/finish", post(handlers::jobs::finish))
        .route(
            "/deployments/{id}/commit-info",
            post(handlers::deployments::commit_info),
        )
        .route("/applications/health", post(handlers::applications::health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::agent_auth,
        ));

    let user_routes = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/servers", get(handlers::servers::list))
        .route("/servers", post(handlers::servers::register))
        .route("/servers/{id}", get(handlers::servers::get))
        .route("/servers/{id}", put(handlers::servers::update))
        .route("/servers/{id}", delete(handlers::servers::delete))
        .route("/applications", get(handlers::applications::list))
        .route("/applications", post(handlers::applications::create))
        .route("/applications/{id}", get(handlers::applications::get))
        .route("/applications/{id}", put(handlers::applications::update))
        .route("/applications/{id}", delete(handlers::applications::delete))
        .route(
            "/applications/{id}/deploy",
            post(handlers::applications::deploy),
        )
        .route(
            "/applications/{id}/start",
            post(handlers::applications::start),
        )
        .route("/applications/{id}/stop", post(handlers::applications::stop))
        .route(
            "/applications/{id}/restart",
            post(handlers::applications::restart),
        )
        .route("/deployments", get(handlers::deployments::list))
        .route("/deployments/{id}", get(handlers::deployments::get))
        .route("/jobs", get(handlers::jobs::list))
        .route("/jobs/{id}", get(handlers::jobs::get))
        .route("/jobs/{id}/retry", post(handlers::jobs::retry))
        .route("/logs", get(handlers::logs::list))
        .route("/metrics/servers/{id}/latest", get(handlers::metrics::latest))
        .route("/metrics/servers/{id}/cpu", get(handlers::metrics::cpu_history))
        .route("/metrics/servers/{id}/net", get(handlers::metrics::net_history))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::user_auth,
        ));

    let public_routes = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout));

    Router::new()
        .merge(agent_routes)
        .nest("/api", public_routes.merge(user_routes))
        .route("/ws/agent", get(ws::agent))
        .route("/ws/user", get(ws::user))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<_> = config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
}
