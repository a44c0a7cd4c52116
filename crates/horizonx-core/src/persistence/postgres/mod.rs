// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL repository implementations.

mod applications;
mod deployments;
mod jobs;
mod logs;
mod metrics;
mod servers;
mod users;

pub use applications::PgApplicationRepository;
pub use deployments::PgDeploymentRepository;
pub use jobs::PgJobRepository;
pub use logs::PgLogRepository;
pub use metrics::PgMetricsRepository;
pub use servers::PgServerRepository;
pub use users::PgUserRepository;
