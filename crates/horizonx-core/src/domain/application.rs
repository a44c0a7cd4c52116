// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application entity.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health status of a containerized workload, as inferred from its
/// container runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Starting,
    Running,
    Restarting,
    Stopped,
    Failed,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starting" => Ok(Self::Starting),
            "running" => Ok(Self::Running),
            "restarting" => Ok(Self::Restarting),
            "stopped" => Ok(Self::Stopped),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown application status: {}", other)),
        }
    }
}

/// A containerized workload bound to a server.
///
/// Environment variables are stored in a separate table and attached on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub server_id: Uuid,
    pub name: String,
    pub repo_url: String,
    pub branch: String,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
    pub health: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create / update request body for an application.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSaveRequest {
    pub server_id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

/// One health observation reported by an agent for an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationHealthReport {
    pub application_id: i64,
    pub status: ApplicationStatus,
}
