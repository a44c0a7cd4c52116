// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! WebSocket session hubs.
//!
//! Two hubs run in the control plane: one for agent sessions, one for user
//! sessions. Each hub holds its state exclusively inside one serializing
//! task consuming a bounded message channel; producers are many, the
//! consumer is one. Sessions own their read and write pumps.
//!
//! The hub never blocks on a slow client: every session has a bounded
//! outbound queue, and a full queue on broadcast force-unregisters the
//! session (it is assumed dead).

pub mod session;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use horizonx_protocol::{OutboundFrame, commands};

use crate::services::ServerService;

/// Capacity of a session's outbound queue.
pub const SESSION_QUEUE: usize = 256;

/// Capacity of the hub's inbound control/work channel.
const HUB_QUEUE: usize = 100;

/// Timeout for the server-status write triggered by connect/disconnect.
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Which protocol a hub speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubRole {
    /// Bearer-authenticated agents; targeted commands, no subscriptions.
    Agent,
    /// Cookie-authenticated web clients; channel subscriptions.
    User,
}

/// Who is on the other end of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIdentity {
    Agent(Uuid),
    User(i64),
}

/// Unique id of one live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Hub-side handle to a session: its identity plus the outbound queue.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub identity: ClientIdentity,
    sender: mpsc::Sender<String>,
}

/// A broadcast on a named channel. An empty channel means "everyone".
#[derive(Debug, Clone)]
pub struct HubEvent {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
}

/// A targeted command for one agent. Best-effort: if the agent is offline
/// the command is logged and dropped.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    pub target_server_id: Uuid,
    pub command: String,
    pub payload: serde_json::Value,
}

enum HubMsg {
    Register(SessionHandle),
    Unregister(SessionId),
    Subscribe(SessionId, String),
    Unsubscribe(SessionId, String),
    AgentReady(Uuid),
    Event(HubEvent),
    Command(AgentCommand),
}

/// Cloneable handle for talking to a hub task.
#[derive(Clone)]
pub struct HubHandle {
    role: HubRole,
    tx: mpsc::Sender<HubMsg>,
}

impl HubHandle {
    pub fn role(&self) -> HubRole {
        self.role
    }

    /// Register a new session; returns its id and the receiver its write
    /// pump drains. The hub owns the only sender, so a force-unregister
    /// closes the queue and tears the write pump down.
    pub async fn register(&self, identity: ClientIdentity) -> (SessionId, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(SESSION_QUEUE);
        let id = SessionId::next();
        let _ = self
            .tx
            .send(HubMsg::Register(SessionHandle {
                id,
                identity,
                sender,
            }))
            .await;
        (id, receiver)
    }

    pub async fn unregister(&self, id: SessionId) {
        let _ = self.tx.send(HubMsg::Unregister(id)).await;
    }

    pub async fn subscribe(&self, id: SessionId, channel: String) {
        let _ = self.tx.send(HubMsg::Subscribe(id, channel)).await;
    }

    pub async fn unsubscribe(&self, id: SessionId, channel: String) {
        let _ = self.tx.send(HubMsg::Unsubscribe(id, channel)).await;
    }

    /// Mark an agent as fully operational.
    pub async fn agent_ready(&self, server_id: Uuid) {
        let _ = self.tx.send(HubMsg::AgentReady(server_id)).await;
    }

    /// Queue a broadcast. Non-blocking from sync contexts.
    pub fn broadcast(&self, event: HubEvent) {
        if self.tx.try_send(HubMsg::Event(event)).is_err() {
            warn!("hub event queue full, broadcast dropped");
        }
    }

    /// Queue a targeted agent command.
    pub fn send_command(&self, command: AgentCommand) {
        if self.tx.try_send(HubMsg::Command(command)).is_err() {
            warn!("hub command queue full, command dropped");
        }
    }
}

struct HubState {
    role: HubRole,
    clients: HashMap<SessionId, SessionHandle>,
    agents: HashMap<Uuid, SessionId>,
    channels: HashMap<String, HashSet<SessionId>>,
    servers: Arc<ServerService>,
}

/// Spawn a hub task and return its handle.
pub fn spawn(role: HubRole, servers: Arc<ServerService>) -> HubHandle {
    let (tx, mut rx) = mpsc::channel(HUB_QUEUE);

    let mut state = HubState {
        role,
        clients: HashMap::new(),
        agents: HashMap::new(),
        channels: HashMap::new(),
        servers,
    };

    tokio::spawn(async move {
        info!(role = ?state.role, "hub started");
        while let Some(msg) = rx.recv().await {
            state.handle(msg);
        }
        info!(role = ?state.role, "hub stopped");
    });

    HubHandle { role, tx }
}

impl HubState {
    fn handle(&mut self, msg: HubMsg) {
        match msg {
            HubMsg::Register(handle) => self.register(handle),
            HubMsg::Unregister(id) => self.unregister(id),
            HubMsg::Subscribe(id, channel) => {
                if self.clients.contains_key(&id) {
                    debug!(session = id.0, channel = %channel, "client subscribed");
                    self.channels.entry(channel).or_default().insert(id);
                }
            }
            HubMsg::Unsubscribe(id, channel) => {
                if let Some(subs) = self.channels.get_mut(&channel) {
                    subs.remove(&id);
                    if subs.is_empty() {
                        self.channels.remove(&channel);
                    }
                    debug!(session = id.0, channel = %channel, "client unsubscribed");
                }
            }
            HubMsg::AgentReady(server_id) => {
                info!(server_id = %server_id, "agent fully operational");
                self.update_server_status(server_id, true);
            }
            HubMsg::Event(event) => self.fan_out(event),
            HubMsg::Command(command) => self.send_command(command),
        }
    }

    fn register(&mut self, handle: SessionHandle) {
        let id = handle.id;
        let identity = handle.identity;
        self.clients.insert(id, handle);
        info!(
            session = id.0,
            identity = ?identity,
            total_clients = self.clients.len(),
            "client registered"
        );

        if let ClientIdentity::Agent(server_id) = identity {
            self.agents.insert(server_id, id);

            // First command after registration carries the canonical id.
            let frame = OutboundFrame::command(
                commands::INIT,
                json!({ "server_id": server_id }),
            );
            self.deliver(id, &frame);
            info!(server_id = %server_id, total_agents = self.agents.len(), "agent registered");
        }
    }

    fn unregister(&mut self, id: SessionId) {
        let Some(handle) = self.clients.remove(&id) else {
            return;
        };
        info!(
            session = id.0,
            total_clients = self.clients.len(),
            "client unregistered"
        );

        for subs in self.channels.values_mut() {
            subs.remove(&id);
        }
        self.channels.retain(|_, subs| !subs.is_empty());

        if let ClientIdentity::Agent(server_id) = handle.identity {
            // Only the session currently owning the server id flips status;
            // a reconnect may already have replaced it.
            if self.agents.get(&server_id) == Some(&id) {
                self.agents.remove(&server_id);
                self.update_server_status(server_id, false);
                info!(server_id = %server_id, total_agents = self.agents.len(), "agent unregistered");
            }
        }
    }

    fn fan_out(&mut self, event: HubEvent) {
        let frame = OutboundFrame::event(event.channel.clone(), event.event, event.payload);

        let targets: Vec<SessionId> = if event.channel.is_empty() {
            self.clients.keys().copied().collect()
        } else {
            match self.channels.get(&event.channel) {
                Some(subs) => subs.iter().copied().collect(),
                None => {
                    debug!(channel = %event.channel, "no subscribers for channel");
                    return;
                }
            }
        };

        for id in targets {
            if !self.deliver(id, &frame) {
                warn!(session = id.0, "session queue full, force unregister");
                self.unregister(id);
            }
        }
    }

    fn send_command(&mut self, command: AgentCommand) {
        let Some(&id) = self.agents.get(&command.target_server_id) else {
            warn!(server_id = %command.target_server_id, "cannot send command, agent offline");
            return;
        };

        let frame = OutboundFrame::command(command.command, command.payload);
        if !self.deliver(id, &frame) {
            warn!(server_id = %command.target_server_id, "agent queue full, command dropped");
        }
    }

    /// Encode and try-send one frame; false means the queue was full.
    fn deliver(&self, id: SessionId, frame: &OutboundFrame) -> bool {
        let Some(handle) = self.clients.get(&id) else {
            return true;
        };
        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to encode outbound frame");
                return true;
            }
        };
        handle.sender.try_send(text).is_ok()
    }

    /// Secondary mutation on connect/disconnect; never blocks the hub task.
    fn update_server_status(&self, server_id: Uuid, is_online: bool) {
        let servers = self.servers.clone();
        tokio::spawn(async move {
            let result = tokio::time::timeout(
                STATUS_TIMEOUT,
                servers.update_status(server_id, is_online),
            )
            .await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(server_id = %server_id, is_online, error = %e,
                        "failed to update server status");
                }
                Err(_) => {
                    warn!(server_id = %server_id, is_online, "server status update timed out");
                }
            }
        });
    }
}
