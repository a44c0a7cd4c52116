// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment entity.
//!
//! A deployment is the high-level record of one deploy attempt. Its status
//! transitions are driven exclusively by the deployment listener reacting to
//! the owning `app_deploy` job's lifecycle events.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deployment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Deploying,
    Success,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Deploying => "deploying",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "deploying" => Ok(Self::Deploying),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown deployment status: {}", other)),
        }
    }
}

/// One deploy attempt of an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: i64,
    pub application_id: i64,
    pub branch: String,
    /// First 8 characters of HEAD, filled when the agent reports it.
    pub commit_hash: Option<String>,
    pub commit_message: Option<String>,
    pub status: DeploymentStatus,
    pub triggered_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub deployed_by: i64,
}

/// Request body for triggering a deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentCreateRequest {
    pub application_id: i64,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub deployed_by: i64,
}
