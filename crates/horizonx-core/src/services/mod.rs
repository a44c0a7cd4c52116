// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application services.
//!
//! Services own entity mutations: repository write first, then the matching
//! domain event on the bus. Subscribers never mutate through anything but a
//! service.

pub mod applications;
pub mod auth;
pub mod deployment_listener;
pub mod deployments;
pub mod jobs;
pub mod logs;
pub mod metrics;
pub mod servers;

pub use applications::ApplicationService;
pub use auth::AuthService;
pub use deployment_listener::DeploymentListener;
pub use deployments::DeploymentService;
pub use jobs::JobService;
pub use logs::LogService;
pub use metrics::MetricsService;
pub use servers::ServerService;
