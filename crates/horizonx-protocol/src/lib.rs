// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HorizonX Protocol - WebSocket + JSON communication layer
//!
//! This crate provides the wire protocol for communication between:
//! - Agents and the control plane (agent session)
//! - Web clients and the control plane (user session)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   horizonx-protocol                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Frames: subscribe / unsubscribe / event / command / ready  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Serialization: JSON (serde)                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transport: WebSocket text frames (≤ 8 KiB)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Sessions
//!
//! ## Agent session
//!
//! Agents authenticate with `Authorization: Bearer <server_uuid>.<secret>`
//! ([`AgentCredentials`]). Inbound frames from an agent are
//! [`InboundFrame::Event`] and [`InboundFrame::Ready`]; the control plane
//! sends [`OutboundFrame::Command`] frames (the first one is always the
//! `init` command carrying the canonical server id).
//!
//! ## User session
//!
//! Web clients authenticate with the signed session cookie and drive their
//! channel subscriptions with [`InboundFrame::Subscribe`] /
//! [`InboundFrame::Unsubscribe`]; the control plane pushes
//! [`OutboundFrame::Event`] frames on subscribed channels.
//!
//! # Liveness
//!
//! The server pings every [`PING_PERIOD`]; a pong resets the [`PONG_WAIT`]
//! read deadline. Writes time out after [`WRITE_WAIT`]. Frames larger than
//! [`MAX_FRAME_SIZE`] are rejected on both sides.

pub mod channel;
pub mod credentials;
pub mod message;

pub use credentials::{AgentCredentials, CredentialsError};
pub use message::{
    AgentEnvelope, FrameError, InboundFrame, MAX_FRAME_SIZE, OutboundFrame, PING_PERIOD,
    PONG_WAIT, WRITE_WAIT, agent_events, commands,
};
