// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Managed host ("server") entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::list::ListOptions;

/// Host OS details reported by the agent on connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsInfo {
    pub hostname: String,
    pub name: String,
    pub arch: String,
    pub kernel_version: String,
}

/// A managed host running the agent.
///
/// `api_token` holds the argon2 hash of the API token and never leaves the
/// process; the plaintext token is returned exactly once at registration.
#[derive(Debug, Clone, Serialize)]
pub struct Server {
    pub id: Uuid,
    pub name: String,
    pub ip_address: Option<String>,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub is_online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_info: Option<OsInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create / update request body for a server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSaveRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// Filter options for listing servers.
#[derive(Debug, Clone, Default)]
pub struct ServerListOptions {
    pub list: ListOptions,
    pub is_online: Option<bool>,
}
