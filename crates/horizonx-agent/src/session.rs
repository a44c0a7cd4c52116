// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reconnecting WebSocket session to the control plane.
//!
//! The session dials with the bearer header, sends the one-time
//! `server_os_info` hello, then runs read and write pumps until either
//! fails; the outer loop backs off 5 s and redials. An HTTP 401 during the
//! upgrade is fatal: the token was revoked and the agent exits.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use horizonx_protocol::{
    InboundFrame, OutboundFrame, PING_PERIOD, PONG_WAIT, WRITE_WAIT, agent_events, channel,
    commands,
};

use horizonx_core::domain::Metrics;

use crate::collector::reader::SystemReader;
use crate::config::Config;
use crate::error::{AgentError, Result};

/// Backoff between reconnect attempts.
const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Capacity of the outbound queue; overflow drops newest with a warning.
const OUTBOUND_QUEUE: usize = 256;

/// Handshake budget for one dial.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Session {
    config: Config,
    reader: Arc<dyn SystemReader>,
    metrics_rx: mpsc::Receiver<Metrics>,
    shutdown: Arc<Notify>,
}

impl Session {
    pub fn new(
        config: Config,
        reader: Arc<dyn SystemReader>,
        metrics_rx: mpsc::Receiver<Metrics>,
    ) -> Self {
        Self {
            config,
            reader,
            metrics_rx,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Dial-and-pump loop. Returns only on shutdown or a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        let mut attempt = 0u64;

        loop {
            attempt += 1;
            info!(attempt, "starting agent session");

            match self.connect_and_pump().await {
                Ok(()) => {
                    info!("agent session ended, reconnecting");
                }
                Err(e) if e.is_fatal() => {
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "agent session failed, will retry");
                }
            }

            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("agent session loop stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(RECONNECT_INTERVAL) => {}
            }
        }
    }

    async fn connect_and_pump(&mut self) -> Result<()> {
        let mut request = self
            .config
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(AgentError::WebSocket)?;
        request.headers_mut().insert(
            "Authorization",
            self.config
                .credentials()
                .authorization_header()
                .parse()
                .map_err(|_| AgentError::Other("invalid authorization header".to_string()))?,
        );

        let connect = connect_async(request);
        let (stream, _response) = match tokio::time::timeout(HANDSHAKE_TIMEOUT, connect).await {
            Ok(Ok(ok)) => ok,
            Ok(Err(WsError::Http(response))) if response.status() == StatusCode::UNAUTHORIZED => {
                return Err(AgentError::Unauthorized);
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(AgentError::Other("websocket handshake timed out".to_string())),
        };

        info!(url = %self.config.ws_url, "connected to control plane");
        let (mut sink, mut reader) = stream.split();

        // One-time hello with host details.
        let os_info = self.reader.os_info();
        let hello = InboundFrame::Event {
            channel: channel::server(self.config.server_id),
            event: agent_events::SERVER_OS_INFO.to_string(),
            payload: serde_json::to_value(&os_info)?,
        };
        sink.send(Message::Text(hello.encode()?.into())).await?;

        // The session is operational once the hello is out.
        sink.send(Message::Text(InboundFrame::Ready.encode()?.into()))
            .await?;

        let mut ping = tokio::time::interval_at(
            tokio::time::Instant::now() + PING_PERIOD,
            PING_PERIOD,
        );
        let server_id = self.config.server_id;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }

                // Outbound: telemetry from the collector.
                maybe_sample = self.metrics_rx.recv() => {
                    let Some(sample) = maybe_sample else {
                        return Ok(());
                    };
                    let frame = InboundFrame::Event {
                        channel: channel::SERVER_METRICS.to_string(),
                        event: agent_events::SERVER_METRICS_REPORT.to_string(),
                        payload: serde_json::to_value(&sample)?,
                    };
                    let send = sink.send(Message::Text(frame.encode()?.into()));
                    if tokio::time::timeout(WRITE_WAIT, send).await.is_err() {
                        return Err(AgentError::Other("write deadline exceeded".to_string()));
                    }
                }

                _ = ping.tick() => {
                    let send = sink.send(Message::Ping(Vec::new().into()));
                    if tokio::time::timeout(WRITE_WAIT, send).await.is_err() {
                        return Err(AgentError::Other("ping deadline exceeded".to_string()));
                    }
                }

                // Inbound: commands from the control plane.
                read = tokio::time::timeout(PONG_WAIT, reader.next()) => {
                    match read {
                        Err(_) => {
                            return Err(AgentError::Other("read deadline expired".to_string()));
                        }
                        Ok(None) => return Ok(()),
                        Ok(Some(Err(e))) => return Err(e.into()),
                        Ok(Some(Ok(Message::Text(text)))) => {
                            handle_frame(server_id, text.as_str());
                        }
                        Ok(Some(Ok(Message::Close(_)))) => return Ok(()),
                        Ok(Some(Ok(_))) => {}
                    }
                }
            }
        }
    }

}

/// Route one frame from the control plane. The `init` command confirms the
/// canonical server id; everything else is informational.
fn handle_frame(server_id: uuid::Uuid, text: &str) {
    let frame = match OutboundFrame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "invalid frame from control plane");
            return;
        }
    };

    match frame {
        OutboundFrame::Command { command, payload } if command == commands::INIT => {
            let canonical = payload
                .get("server_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            if canonical != server_id.to_string() {
                warn!(
                    canonical,
                    configured = %server_id,
                    "init command carries a different server id"
                );
            } else {
                info!(server_id = canonical, "agent initialized");
            }
        }
        OutboundFrame::Command { command, .. } => {
            debug!(command = %command, "unhandled command");
        }
        OutboundFrame::Event { event, .. } => {
            debug!(event = %event, "ignoring broadcast event");
        }
    }
}

/// Outbound telemetry queue between collector and session.
pub fn metrics_channel() -> (mpsc::Sender<Metrics>, mpsc::Receiver<Metrics>) {
    mpsc::channel(OUTBOUND_QUEUE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_channel_is_bounded() {
        let (tx, _rx) = metrics_channel();
        for _ in 0..OUTBOUND_QUEUE {
            tx.try_send(Metrics::default()).unwrap();
        }
        assert!(tx.try_send(Metrics::default()).is_err(), "overflow is rejected");
    }
}
