// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire format for WebSocket session framing.
//!
//! Every frame is a single JSON text message with a `type` discriminator:
//! - inbound from a user client: `{"type":"subscribe","channel":...}` or
//!   `{"type":"unsubscribe","channel":...}`
//! - inbound from an agent: `{"type":"event",...}` or `{"type":"ready"}`
//! - outbound: `{"type":"event",...}` or `{"type":"command",...}`

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum frame size accepted on either side (8 KiB).
pub const MAX_FRAME_SIZE: usize = 8192;

/// Read deadline; reset whenever a pong arrives.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Ping interval, 90% of the read deadline.
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Write deadline for a single outbound frame.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Command names sent from the control plane to agents.
pub mod commands {
    /// First command after an agent registers; payload carries the
    /// canonical `server_id`.
    pub const INIT: &str = "init";
}

/// Event names agents publish upstream.
pub mod agent_events {
    /// One-time hello carrying hostname, OS name, kernel, arch.
    pub const SERVER_OS_INFO: &str = "server_os_info";

    /// Live telemetry sample from the collector.
    pub const SERVER_METRICS_REPORT: &str = "server_metrics_report";
}

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame too large: {0} bytes (max: {MAX_FRAME_SIZE})")]
    FrameTooLarge(usize),

    #[error("invalid frame: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Frame received by the control plane from a connected session.
///
/// `Subscribe`/`Unsubscribe` are only meaningful on user sessions,
/// `Event`/`Ready` only on agent sessions; the hub ignores the rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    Subscribe {
        channel: String,
    },
    Unsubscribe {
        channel: String,
    },
    Event {
        channel: String,
        event: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Ready,
}

/// Frame sent by the control plane to a connected session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Event {
        channel: String,
        event: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Command {
        command: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

/// Payload wrapper an agent attaches to everything it publishes upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEnvelope {
    pub server_id: Uuid,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl InboundFrame {
    /// Decode a frame from a raw text message, enforcing the size cap.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        if text.len() > MAX_FRAME_SIZE {
            return Err(FrameError::FrameTooLarge(text.len()));
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Encode the frame to a JSON text message.
    pub fn encode(&self) -> Result<String, FrameError> {
        encode_checked(self)
    }
}

impl OutboundFrame {
    /// Build an event frame for a channel.
    pub fn event(channel: impl Into<String>, event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::Event {
            channel: channel.into(),
            event: event.into(),
            payload,
        }
    }

    /// Build a command frame.
    pub fn command(command: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::Command {
            command: command.into(),
            payload,
        }
    }

    /// Decode a frame from a raw text message, enforcing the size cap.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        if text.len() > MAX_FRAME_SIZE {
            return Err(FrameError::FrameTooLarge(text.len()));
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Encode the frame to a JSON text message.
    pub fn encode(&self) -> Result<String, FrameError> {
        encode_checked(self)
    }
}

fn encode_checked<T: Serialize>(value: &T) -> Result<String, FrameError> {
    let text = serde_json::to_string(value)?;
    if text.len() > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge(text.len()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_round_trip() {
        let frame = InboundFrame::Subscribe {
            channel: "servers".to_string(),
        };
        let text = frame.encode().unwrap();
        assert_eq!(text, r#"{"type":"subscribe","channel":"servers"}"#);
        assert_eq!(InboundFrame::decode(&text).unwrap(), frame);
    }

    #[test]
    fn test_ready_round_trip() {
        let text = InboundFrame::Ready.encode().unwrap();
        assert_eq!(text, r#"{"type":"ready"}"#);
        assert_eq!(InboundFrame::decode(&text).unwrap(), InboundFrame::Ready);
    }

    #[test]
    fn test_event_payload_defaults_to_null() {
        let frame = InboundFrame::decode(r#"{"type":"event","channel":"c","event":"e"}"#).unwrap();
        match frame {
            InboundFrame::Event { payload, .. } => assert!(payload.is_null()),
            other => panic!("expected event frame, got {:?}", other),
        }
    }

    #[test]
    fn test_command_frame_shape() {
        let frame = OutboundFrame::command(commands::INIT, json!({"server_id": "abc"}));
        let text = frame.encode().unwrap();
        assert_eq!(
            text,
            r#"{"type":"command","command":"init","payload":{"server_id":"abc"}}"#
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(InboundFrame::decode(r#"{"type":"bogus"}"#).is_err());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let big = "x".repeat(MAX_FRAME_SIZE + 1);
        let err = InboundFrame::decode(&big).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge(_)));

        let frame = OutboundFrame::event("c", "e", json!("y".repeat(MAX_FRAME_SIZE)));
        assert!(matches!(
            frame.encode().unwrap_err(),
            FrameError::FrameTooLarge(_)
        ));
    }

    #[test]
    fn test_ping_period_is_ninety_percent_of_pong_wait() {
        assert_eq!(PING_PERIOD.as_secs(), PONG_WAIT.as_secs() * 9 / 10);
    }
}
