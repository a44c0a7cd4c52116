// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound fan-out: domain events onto WebSocket channels.
//!
//! One translator per topic. Payloads pass through unchanged ([`Event`]
//! serializes untagged, so the wire sees the bare payload); this module owns
//! channel naming only. Broadcasts are queued on the user hub and never
//! block the publisher.

use tracing::warn;

use horizonx_protocol::channel;

use crate::bus::{Bus, topics};
use crate::domain::Event;
use crate::hub::{HubEvent, HubHandle};

/// Wire every translator onto the bus.
pub fn register(bus: &Bus, hub: HubHandle) {
    // Log events
    subscribe(bus, hub.clone(), topics::LOG_RECEIVED, |event| match event {
        Event::LogReceived(_) => vec![channel::LOGS.to_string()],
        _ => Vec::new(),
    });

    // Server events
    subscribe(
        bus,
        hub.clone(),
        topics::SERVER_STATUS_CHANGED,
        |event| match event {
            Event::ServerStatusChanged(e) => vec![
                channel::server(e.server_id),
                channel::SERVERS.to_string(),
            ],
            _ => Vec::new(),
        },
    );
    subscribe(
        bus,
        hub.clone(),
        topics::SERVER_METRICS_RECEIVED,
        |event| match event {
            Event::ServerMetricsReceived(_) => vec![channel::SERVER_METRICS.to_string()],
            _ => Vec::new(),
        },
    );

    // Job events
    for topic in [
        topics::JOB_CREATED,
        topics::JOB_STARTED,
        topics::JOB_FINISHED,
        topics::JOB_STATUS_CHANGED,
    ] {
        subscribe(bus, hub.clone(), topic, |event| {
            let job_id = match event {
                Event::JobCreated(e) | Event::JobStarted(e) => e.job_id,
                Event::JobFinished(e) => e.job.job_id,
                Event::JobStatusChanged(e) => e.job_id,
                _ => return Vec::new(),
            };
            vec![channel::job(job_id), channel::JOBS.to_string()]
        });
    }

    // Application events
    for topic in [
        topics::APPLICATION_CREATED,
        topics::APPLICATION_STATUS_CHANGED,
        topics::APPLICATION_DEPLOYED,
    ] {
        subscribe(bus, hub.clone(), topic, |event| match event {
            Event::ApplicationCreated(e)
            | Event::ApplicationStatusChanged(e)
            | Event::ApplicationDeployed(e) => vec![
                channel::application(e.application_id),
                channel::APPLICATIONS.to_string(),
            ],
            _ => Vec::new(),
        });
    }

    // Deployment events: scoped channel, owning application, firehose.
    for topic in [
        topics::DEPLOYMENT_CREATED,
        topics::DEPLOYMENT_STARTED,
        topics::DEPLOYMENT_FINISHED,
        topics::DEPLOYMENT_STATUS_CHANGED,
        topics::DEPLOYMENT_COMMIT_INFO_RECEIVED,
        topics::DEPLOYMENT_LOGS_UPDATED,
        topics::DEPLOYMENT_COMPLETED,
    ] {
        subscribe(bus, hub.clone(), topic, |event| {
            let (deployment_id, application_id) = match event {
                Event::DeploymentCreated(e) => (e.deployment_id, e.application_id),
                Event::DeploymentStarted(e) => (e.deployment_id, e.application_id),
                Event::DeploymentFinished(e) | Event::DeploymentCompleted(e) => {
                    (e.deployment_id, e.application_id)
                }
                Event::DeploymentStatusChanged(e) => (e.deployment_id, e.application_id),
                Event::DeploymentCommitInfoReceived(e) => (e.deployment_id, e.application_id),
                Event::DeploymentLogsUpdated(e) => (e.deployment_id, e.application_id),
                _ => return Vec::new(),
            };
            vec![
                channel::deployment(deployment_id),
                channel::application(application_id),
                channel::DEPLOYMENTS.to_string(),
            ]
        });
    }
}

/// Register one bus handler broadcasting the event payload onto the
/// channels the translator names.
fn subscribe<F>(bus: &Bus, hub: HubHandle, topic: &'static str, channels: F)
where
    F: Fn(&Event) -> Vec<String> + Send + Sync + 'static,
{
    bus.subscribe(topic, move |event| {
        let targets = channels(event);
        if targets.is_empty() {
            return;
        }

        let payload = match serde_json::to_value(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(topic, error = %e, "failed to serialize event payload");
                return;
            }
        };

        for channel in targets {
            hub.broadcast(HubEvent {
                channel,
                event: topic.to_string(),
                payload: payload.clone(),
            });
        }
    });
}
