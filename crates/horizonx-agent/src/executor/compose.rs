// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Container composer operations for application workloads.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::error::{AgentError, Result};
use crate::executor::command::{Command, StreamHandler};

/// Compose file names accepted in an application checkout.
const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

pub struct ComposeManager {
    work_dir: PathBuf,
}

impl ComposeManager {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
        }
    }

    fn app_dir(&self, application_id: i64) -> PathBuf {
        self.work_dir.join(format!("app-{}", application_id))
    }

    pub async fn up(
        &self,
        application_id: i64,
        detached: bool,
        build: bool,
        handler: Option<StreamHandler>,
    ) -> Result<String> {
        let mut args = vec!["compose", "up"];
        if detached {
            args.push("-d");
        }
        if build {
            args.push("--build");
        }
        Command::new(&self.app_dir(application_id), "docker", &args)
            .run(handler)
            .await
    }

    pub async fn down(
        &self,
        application_id: i64,
        remove_volumes: bool,
        handler: Option<StreamHandler>,
    ) -> Result<String> {
        let mut args = vec!["compose", "down"];
        if remove_volumes {
            args.push("-v");
        }
        Command::new(&self.app_dir(application_id), "docker", &args)
            .run(handler)
            .await
    }

    pub async fn start(&self, application_id: i64, handler: Option<StreamHandler>) -> Result<String> {
        Command::new(&self.app_dir(application_id), "docker", &["compose", "start"])
            .run(handler)
            .await
    }

    pub async fn stop(&self, application_id: i64, handler: Option<StreamHandler>) -> Result<String> {
        Command::new(&self.app_dir(application_id), "docker", &["compose", "stop"])
            .run(handler)
            .await
    }

    pub async fn restart(
        &self,
        application_id: i64,
        handler: Option<StreamHandler>,
    ) -> Result<String> {
        Command::new(&self.app_dir(application_id), "docker", &["compose", "restart"])
            .run(handler)
            .await
    }

    /// `compose ps --format json` for health inference.
    pub async fn ps_json(&self, application_id: i64) -> Result<String> {
        Command::new(
            &self.app_dir(application_id),
            "docker",
            &["compose", "ps", "--format", "json", "--all"],
        )
        .run(None)
        .await
    }

    /// A deployable checkout must carry a compose file.
    pub fn validate_compose_file(&self, application_id: i64) -> Result<()> {
        let app_dir = self.app_dir(application_id);
        if COMPOSE_FILES.iter().any(|f| app_dir.join(f).exists()) {
            Ok(())
        } else {
            Err(AgentError::CommandFailed(
                "no compose file found in checkout".to_string(),
            ))
        }
    }

    /// Write `.env` (mode 0600) with newlines escaped in values.
    pub fn write_env_file(
        &self,
        application_id: i64,
        env_vars: &HashMap<String, String>,
    ) -> Result<()> {
        let env_path = self.app_dir(application_id).join(".env");

        let mut content = String::new();
        let mut keys: Vec<&String> = env_vars.keys().collect();
        keys.sort();
        for key in keys {
            let value = env_vars[key].replace('\n', "\\n");
            content.push_str(&format!("{}=\"{}\"\n", key, value));
        }

        std::fs::write(&env_path, content)?;
        std::fs::set_permissions(&env_path, std::fs::Permissions::from_mode(0o600))?;
        Ok(())
    }

    pub async fn is_docker_installed(&self) -> bool {
        tokio::process::Command::new("docker")
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    pub async fn is_compose_available(&self) -> bool {
        tokio::process::Command::new("docker")
            .args(["compose", "version"])
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_compose_file_variants() {
        let dir = tempfile::tempdir().unwrap();
        let compose = ComposeManager::new(dir.path());
        let app_dir = dir.path().join("app-1");
        std::fs::create_dir_all(&app_dir).unwrap();

        assert!(compose.validate_compose_file(1).is_err());

        std::fs::write(app_dir.join("compose.yaml"), "services: {}").unwrap();
        assert!(compose.validate_compose_file(1).is_ok());
    }

    #[test]
    fn test_write_env_file_escapes_and_restricts() {
        let dir = tempfile::tempdir().unwrap();
        let compose = ComposeManager::new(dir.path());
        let app_dir = dir.path().join("app-7");
        std::fs::create_dir_all(&app_dir).unwrap();

        let mut env = HashMap::new();
        env.insert("KEY".to_string(), "line1\nline2".to_string());
        env.insert("API_URL".to_string(), "https://example.com".to_string());
        compose.write_env_file(7, &env).unwrap();

        let path = app_dir.join(".env");
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("KEY=\"line1\\nline2\"\n"));
        assert!(content.contains("API_URL=\"https://example.com\"\n"));

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
