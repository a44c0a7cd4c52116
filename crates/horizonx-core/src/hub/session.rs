// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-session read and write pumps.
//!
//! Each accepted WebSocket runs two tasks: the write pump drains the
//! session's bounded queue and emits pings, the read pump enforces the pong
//! deadline and routes inbound frames. Either pump exiting tears the
//! session down and unregisters it from its hub.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Instant, interval_at, timeout};
use tracing::{debug, warn};
use uuid::Uuid;

use horizonx_protocol::{InboundFrame, PING_PERIOD, PONG_WAIT, WRITE_WAIT, agent_events};

use crate::domain::{Metrics, OsInfo};
use crate::hub::{ClientIdentity, HubEvent, HubHandle};
use crate::services::{MetricsService, ServerService};

/// Sinks agent-published events into the control plane.
pub struct AgentIngest {
    pub servers: Arc<ServerService>,
    pub metrics: Arc<MetricsService>,
    /// Agent events with no dedicated handler are forwarded here.
    pub user_hub: HubHandle,
}

/// Drive one session until it disconnects. Blocks until teardown.
pub async fn run(
    socket: WebSocket,
    identity: ClientIdentity,
    hub: HubHandle,
    ingest: Option<Arc<AgentIngest>>,
) {
    let (session_id, mut outbound) = hub.register(identity).await;
    let (mut sink, mut stream) = socket.split();

    let mut write_pump = tokio::spawn(async move {
        let mut ping = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
        loop {
            tokio::select! {
                maybe = outbound.recv() => {
                    match maybe {
                        Some(text) => {
                            let send = sink.send(Message::Text(text.into()));
                            match timeout(WRITE_WAIT, send).await {
                                Ok(Ok(())) => {}
                                _ => break,
                            }
                        }
                        // Queue dropped by the hub (force-unregister).
                        None => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
                _ = ping.tick() => {
                    let send = sink.send(Message::Ping(Vec::new().into()));
                    match timeout(WRITE_WAIT, send).await {
                        Ok(Ok(())) => {}
                        _ => break,
                    }
                }
            }
        }
    });

    // Read pump on this task; the pong deadline restarts on every frame.
    loop {
        let frame = tokio::select! {
            read = timeout(PONG_WAIT, stream.next()) => match read {
                Err(_) => {
                    debug!(session = ?session_id, "read deadline expired");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    debug!(session = ?session_id, error = %e, "websocket read failed");
                    break;
                }
                Ok(Some(Ok(frame))) => frame,
            },
            _ = &mut write_pump => break,
        };

        match frame {
            Message::Text(text) => {
                let inbound = match InboundFrame::decode(text.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(session = ?session_id, error = %e, "invalid inbound frame");
                        continue;
                    }
                };
                route(&hub, session_id, identity, ingest.as_deref(), inbound).await;
            }
            // Pings are answered by the transport; both directions refresh
            // the deadline by arriving at all.
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
            Message::Binary(_) => {
                warn!(session = ?session_id, "binary frame ignored");
            }
        }
    }

    write_pump.abort();
    hub.unregister(session_id).await;
}

async fn route(
    hub: &HubHandle,
    session_id: crate::hub::SessionId,
    identity: ClientIdentity,
    ingest: Option<&AgentIngest>,
    frame: InboundFrame,
) {
    match (identity, frame) {
        (ClientIdentity::User(_), InboundFrame::Subscribe { channel }) => {
            hub.subscribe(session_id, channel).await;
        }
        (ClientIdentity::User(_), InboundFrame::Unsubscribe { channel }) => {
            hub.unsubscribe(session_id, channel).await;
        }
        (ClientIdentity::Agent(server_id), InboundFrame::Ready) => {
            hub.agent_ready(server_id).await;
        }
        (
            ClientIdentity::Agent(server_id),
            InboundFrame::Event {
                channel,
                event,
                payload,
            },
        ) => {
            let Some(ingest) = ingest else {
                return;
            };
            handle_agent_event(ingest, server_id, channel, event, payload).await;
        }
        (identity, frame) => {
            warn!(identity = ?identity, frame = ?frame, "frame not valid for this session type");
        }
    }
}

/// Route one agent-published event. Telemetry and the OS hello have
/// dedicated sinks; anything else passes through to the user hub.
async fn handle_agent_event(
    ingest: &AgentIngest,
    server_id: Uuid,
    channel: String,
    event: String,
    payload: serde_json::Value,
) {
    match event.as_str() {
        agent_events::SERVER_METRICS_REPORT => {
            let mut sample: Metrics = match serde_json::from_value(payload) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(server_id = %server_id, error = %e, "invalid metrics payload");
                    return;
                }
            };
            // The session's identity is authoritative, not the payload.
            sample.server_id = server_id;
            if let Err(e) = ingest.metrics.ingest(sample).await {
                warn!(server_id = %server_id, error = %e, "failed to ingest metrics");
            }
        }
        agent_events::SERVER_OS_INFO => {
            let os_info: OsInfo = match serde_json::from_value(payload) {
                Ok(os_info) => os_info,
                Err(e) => {
                    warn!(server_id = %server_id, error = %e, "invalid os info payload");
                    return;
                }
            };
            if let Err(e) = ingest.servers.update_os_info(server_id, os_info).await {
                warn!(server_id = %server_id, error = %e, "failed to store os info");
            }
        }
        _ => {
            ingest.user_hub.broadcast(HubEvent {
                channel,
                event,
                payload,
            });
        }
    }
}
