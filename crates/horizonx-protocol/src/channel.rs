// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Well-known subscription channel names.
//!
//! User clients subscribe to these channels; the outbound fan-out translates
//! domain events onto them. An empty channel on a broadcast means "everyone".

use uuid::Uuid;

/// All servers (status changes of any server).
pub const SERVERS: &str = "servers";

/// Latest telemetry of every server.
pub const SERVER_METRICS: &str = "server_metrics";

/// All applications.
pub const APPLICATIONS: &str = "applications";

/// All jobs.
pub const JOBS: &str = "jobs";

/// All deployments.
pub const DEPLOYMENTS: &str = "deployments";

/// Live log feed.
pub const LOGS: &str = "logs";

/// Channel for a single server.
pub fn server(id: Uuid) -> String {
    format!("server:{}", id)
}

/// Channel for a single application.
pub fn application(id: i64) -> String {
    format!("application:{}", id)
}

/// Channel for a single job.
pub fn job(id: i64) -> String {
    format!("job:{}", id)
}

/// Channel for a single deployment.
pub fn deployment(id: i64) -> String {
    format!("deployment:{}", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_channel_names() {
        let id = Uuid::nil();
        assert_eq!(
            server(id),
            "server:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(application(7), "application:7");
        assert_eq!(job(42), "job:42");
        assert_eq!(deployment(3), "deployment:3");
    }
}
