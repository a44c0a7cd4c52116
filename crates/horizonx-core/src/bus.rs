// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process named-topic publish/subscribe.
//!
//! Fan-out is synchronous on the publisher's calling context, at-most-once,
//! in registration order. Each handler invocation is isolated so that a
//! panicking handler cannot poison its siblings or the publisher. There is
//! no back-pressure: handlers that need asynchrony hand off to their own
//! queues.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::error;

use crate::domain::Event;

/// Topic names used across the control plane.
pub mod topics {
    pub const JOB_CREATED: &str = "job_created";
    pub const JOB_STARTED: &str = "job_started";
    pub const JOB_FINISHED: &str = "job_finished";
    pub const JOB_STATUS_CHANGED: &str = "job_status_changed";

    pub const DEPLOYMENT_CREATED: &str = "deployment_created";
    pub const DEPLOYMENT_STARTED: &str = "deployment_started";
    pub const DEPLOYMENT_FINISHED: &str = "deployment_finished";
    pub const DEPLOYMENT_STATUS_CHANGED: &str = "deployment_status_changed";
    pub const DEPLOYMENT_COMMIT_INFO_RECEIVED: &str = "deployment_commit_info_received";
    pub const DEPLOYMENT_LOGS_UPDATED: &str = "deployment_logs_updated";
    pub const DEPLOYMENT_COMPLETED: &str = "deployment_completed";

    pub const APPLICATION_CREATED: &str = "application_created";
    pub const APPLICATION_STATUS_CHANGED: &str = "application_status_changed";
    pub const APPLICATION_DEPLOYED: &str = "application_deployed";

    pub const SERVER_STATUS_CHANGED: &str = "server_status_changed";
    pub const SERVER_METRICS_RECEIVED: &str = "server_metrics_received";

    pub const LOG_RECEIVED: &str = "log_received";
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Named-topic in-process event bus.
#[derive(Default)]
pub struct Bus {
    handlers: RwLock<HashMap<&'static str, Vec<Handler>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a topic. Handlers run in registration order.
    pub fn subscribe<F>(&self, topic: &'static str, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .expect("bus lock poisoned")
            .entry(topic)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Deliver an event to every handler subscribed to `topic`.
    ///
    /// Handlers run on the caller's thread; a panic in one handler is caught
    /// and logged, and delivery continues with the next handler. The handler
    /// list is snapshotted before delivery, so handlers may subscribe without
    /// deadlocking the bus.
    pub fn publish(&self, topic: &'static str, event: &Event) {
        let handlers: Vec<Handler> = {
            let guard = self.handlers.read().expect("bus lock poisoned");
            match guard.get(topic) {
                Some(handlers) => handlers.clone(),
                None => return,
            }
        };

        for handler in &handlers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(topic, panic = %detail, "event handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ServerStatusChanged;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn status_event() -> Event {
        Event::ServerStatusChanged(ServerStatusChanged {
            server_id: Uuid::nil(),
            is_online: true,
        })
    }

    #[test]
    fn test_delivers_exactly_once_in_registration_order() {
        let bus = Bus::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            bus.subscribe(topics::SERVER_STATUS_CHANGED, move |_| {
                order.lock().unwrap().push(i);
            });
        }

        bus.publish(topics::SERVER_STATUS_CHANGED, &status_event());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unknown_topic_is_a_no_op() {
        let bus = Bus::new();
        bus.publish(topics::JOB_CREATED, &status_event());
    }

    #[test]
    fn test_panicking_handler_does_not_poison_siblings() {
        let bus = Bus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.subscribe(topics::SERVER_STATUS_CHANGED, |_| {
            panic!("handler exploded");
        });
        let counter = hits.clone();
        bus.subscribe(topics::SERVER_STATUS_CHANGED, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(topics::SERVER_STATUS_CHANGED, &status_event());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // The bus itself stays usable after a panic.
        bus.publish(topics::SERVER_STATUS_CHANGED, &status_event());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_topics_are_independent() {
        let bus = Bus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        bus.subscribe(topics::JOB_CREATED, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(topics::JOB_STARTED, &status_event());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bus.publish(topics::JOB_CREATED, &status_event());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
