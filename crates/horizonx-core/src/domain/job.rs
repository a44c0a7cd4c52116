// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job entity and its state machine.
//!
//! A job is a unit of work owned by the control plane and executed by the
//! agent of its owning server. Status transitions are monotonic:
//!
//! ```text
//!             create          start           finish(success)
//! pending ─────────────► running ──────────────► success
//!                           │
//!                           │ finish(failed)
//!                           └────────────────► failed
//! ```
//!
//! Terminal states are sticky; a retry is a new `pending` row carrying the
//! same trace id.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::list::ListOptions;
use super::log::Log;

/// What an agent should do when it picks up the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    MetricsCollect,
    AppHealthCheck,
    AppDeploy,
    AppStart,
    AppStop,
    AppRestart,
    AgentInit,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetricsCollect => "metrics_collect",
            Self::AppHealthCheck => "app_health_check",
            Self::AppDeploy => "app_deploy",
            Self::AppStart => "app_start",
            Self::AppStop => "app_stop",
            Self::AppRestart => "app_restart",
            Self::AgentInit => "agent_init",
        }
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metrics_collect" => Ok(Self::MetricsCollect),
            "app_health_check" => Ok(Self::AppHealthCheck),
            "app_deploy" => Ok(Self::AppDeploy),
            "app_start" => Ok(Self::AppStart),
            "app_stop" => Ok(Self::AppStop),
            "app_restart" => Ok(Self::AppRestart),
            "agent_init" => Ok(Self::AgentInit),
            other => Err(format!("unknown job type: {}", other)),
        }
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Terminal states are sticky.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// A unit of work owned by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    /// Groups related jobs and logs produced by one user action.
    pub trace_id: Uuid,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub server_id: Uuid,
    pub application_id: Option<i64>,
    pub deployment_id: Option<i64>,
    /// Opaque payload interpreted by the executor.
    #[serde(default)]
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Correlated logs, attached when fetching a single job.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<Log>,
}

/// Filter options for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct JobListOptions {
    pub list: ListOptions,
    pub server_id: Option<Uuid>,
    pub application_id: Option<i64>,
    pub deployment_id: Option<i64>,
    pub trace_id: Option<Uuid>,
    pub status: Option<JobStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_round_trip() {
        for t in [
            JobType::MetricsCollect,
            JobType::AppHealthCheck,
            JobType::AppDeploy,
            JobType::AppStart,
            JobType::AppStop,
            JobType::AppRestart,
            JobType::AgentInit,
        ] {
            assert_eq!(t.as_str().parse::<JobType>().unwrap(), t);
        }
    }

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_job_serializes_type_field() {
        let job = Job {
            id: 1,
            trace_id: Uuid::nil(),
            job_type: JobType::AppDeploy,
            server_id: Uuid::nil(),
            application_id: Some(2),
            deployment_id: None,
            payload: serde_json::json!({"branch": "main"}),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            logs: Vec::new(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["type"], "app_deploy");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["payload"]["branch"], "main");
    }
}
