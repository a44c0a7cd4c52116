// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application health inferred from container runtime state.

use serde::Deserialize;

use horizonx_core::domain::ApplicationStatus;

/// One container row from `compose ps --format json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Container {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Health", default)]
    pub health: String,
    #[serde(rename = "ExitCode", default)]
    pub exit_code: i32,
}

/// Map one container's (state, health, exit code) to an application status.
/// The mapping is total: every input lands on exactly one status.
pub fn container_status(state: &str, health: &str, exit_code: i32) -> ApplicationStatus {
    match state {
        "running" => match health {
            "unhealthy" => ApplicationStatus::Failed,
            "starting" => ApplicationStatus::Starting,
            _ => ApplicationStatus::Running,
        },
        "restarting" => ApplicationStatus::Restarting,
        "exited" => {
            if exit_code == 0 {
                ApplicationStatus::Stopped
            } else {
                ApplicationStatus::Failed
            }
        }
        "paused" => ApplicationStatus::Stopped,
        _ => ApplicationStatus::Failed,
    }
}

/// Collapse the statuses of an application's containers into one. The worst
/// state wins; an application with no containers is stopped.
pub fn aggregate_status(containers: &[Container]) -> ApplicationStatus {
    let mut worst: Option<ApplicationStatus> = None;
    for container in containers {
        let status = container_status(&container.state, &container.health, container.exit_code);
        worst = Some(match worst {
            None => status,
            Some(current) => {
                if severity(status) > severity(current) {
                    status
                } else {
                    current
                }
            }
        });
    }
    worst.unwrap_or(ApplicationStatus::Stopped)
}

fn severity(status: ApplicationStatus) -> u8 {
    match status {
        ApplicationStatus::Running => 0,
        ApplicationStatus::Stopped => 1,
        ApplicationStatus::Starting => 2,
        ApplicationStatus::Restarting => 3,
        ApplicationStatus::Failed => 4,
    }
}

/// Parse `compose ps --format json` output: either one JSON object per line
/// or a single JSON array, depending on the composer version.
pub fn parse_ps_output(output: &str) -> Vec<Container> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).unwrap_or_default();
    }

    trimmed
        .lines()
        .filter_map(|line| serde_json::from_str(line.trim()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_table() {
        let cases = [
            ("running", "unhealthy", 0, ApplicationStatus::Failed),
            ("running", "starting", 0, ApplicationStatus::Starting),
            ("running", "healthy", 0, ApplicationStatus::Running),
            ("running", "", 0, ApplicationStatus::Running),
            ("restarting", "healthy", 0, ApplicationStatus::Restarting),
            ("restarting", "", 1, ApplicationStatus::Restarting),
            ("exited", "", 0, ApplicationStatus::Stopped),
            ("exited", "", 137, ApplicationStatus::Failed),
            ("paused", "", 0, ApplicationStatus::Stopped),
            ("paused", "unhealthy", 1, ApplicationStatus::Stopped),
            ("dead", "", 0, ApplicationStatus::Failed),
            ("created", "", 0, ApplicationStatus::Failed),
            ("", "", 0, ApplicationStatus::Failed),
        ];

        for (state, health, exit_code, expected) in cases {
            assert_eq!(
                container_status(state, health, exit_code),
                expected,
                "state={} health={} exit={}",
                state,
                health,
                exit_code
            );
        }
    }

    fn container(state: &str, health: &str, exit_code: i32) -> Container {
        Container {
            id: String::new(),
            name: String::new(),
            state: state.to_string(),
            health: health.to_string(),
            exit_code,
        }
    }

    #[test]
    fn test_aggregate_takes_worst() {
        let containers = vec![
            container("running", "healthy", 0),
            container("exited", "", 1),
        ];
        assert_eq!(aggregate_status(&containers), ApplicationStatus::Failed);

        let containers = vec![
            container("running", "healthy", 0),
            container("running", "starting", 0),
        ];
        assert_eq!(aggregate_status(&containers), ApplicationStatus::Starting);
    }

    #[test]
    fn test_aggregate_empty_is_stopped() {
        assert_eq!(aggregate_status(&[]), ApplicationStatus::Stopped);
    }

    #[test]
    fn test_parse_line_delimited_output() {
        let output = r#"
{"ID":"abc","Name":"web","State":"running","Health":"healthy","ExitCode":0}
{"ID":"def","Name":"db","State":"exited","Health":"","ExitCode":1}
"#;
        let containers = parse_ps_output(output);
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].name, "web");
        assert_eq!(containers[1].exit_code, 1);
    }

    #[test]
    fn test_parse_array_output() {
        let output = r#"[{"ID":"abc","Name":"web","State":"running","Health":"","ExitCode":0}]"#;
        let containers = parse_ps_output(output);
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].state, "running");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_ps_output("").is_empty());
        assert!(parse_ps_output("  \n").is_empty());
    }
}
