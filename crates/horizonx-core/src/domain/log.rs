// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Append-only log records correlated by trace id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::list::ListOptions;

/// Which process produced the log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    Agent,
    Server,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Server => "server",
        }
    }
}

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

/// The operation a log line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    AppDeploy,
    AppStart,
    AppStop,
    AppRestart,
    AppHealthCheck,
    MetricsCollect,
    ServerRegister,
    ServerStatus,
    DeploymentTrigger,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppDeploy => "app_deploy",
            Self::AppStart => "app_start",
            Self::AppStop => "app_stop",
            Self::AppRestart => "app_restart",
            Self::AppHealthCheck => "app_health_check",
            Self::MetricsCollect => "metrics_collect",
            Self::ServerRegister => "server_register",
            Self::ServerStatus => "server_status",
            Self::DeploymentTrigger => "deployment_trigger",
        }
    }
}

/// Deploy pipeline step a log line was produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStep {
    GitClone,
    BuildPrepare,
    DockerBuild,
    DockerStart,
    DockerStop,
    DockerRestart,
    DockerHealthCheck,
}

/// Which process stream a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Structured context attached to a log record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LogContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<LogStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<LogStream>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(rename = "latency_ms", skip_serializing_if = "Option::is_none")]
    pub latency: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A stored log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: LogSource,
    pub action: LogAction,
    pub trace_id: Uuid,
    pub job_id: Option<i64>,
    pub server_id: Option<Uuid>,
    pub application_id: Option<i64>,
    pub deployment_id: Option<i64>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<LogContext>,
    pub created_at: DateTime<Utc>,
}

/// Ingest request posted by agents (and emitted internally by services).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEmitRequest {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: LogSource,
    pub action: LogAction,
    pub trace_id: Uuid,
    pub job_id: Option<i64>,
    pub server_id: Option<Uuid>,
    pub application_id: Option<i64>,
    pub deployment_id: Option<i64>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<LogContext>,
}

/// Filter options for listing logs.
#[derive(Debug, Clone, Default)]
pub struct LogListOptions {
    pub list: ListOptions,
    pub trace_id: Option<Uuid>,
    pub job_id: Option<i64>,
    pub server_id: Option<Uuid>,
    pub application_id: Option<i64>,
    pub deployment_id: Option<i64>,
    pub levels: Vec<LogLevel>,
    pub sources: Vec<LogSource>,
}
