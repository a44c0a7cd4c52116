// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Git operations for application checkouts.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::executor::command::{Command, StreamHandler};

pub struct GitManager {
    work_dir: PathBuf,
}

impl GitManager {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// Checkout directory for an application.
    pub fn app_dir(&self, application_id: i64) -> PathBuf {
        self.work_dir.join(format!("app-{}", application_id))
    }

    pub fn is_repo(&self, application_id: i64) -> bool {
        self.app_dir(application_id).join(".git").exists()
    }

    /// Shallow-clone on first deploy, pull afterwards.
    pub async fn clone_or_pull(
        &self,
        application_id: i64,
        remote_url: &str,
        branch: &str,
        handler: Option<StreamHandler>,
    ) -> Result<String> {
        if self.is_repo(application_id) {
            self.pull(application_id, branch, handler).await
        } else {
            self.clone(application_id, remote_url, branch, handler).await
        }
    }

    pub async fn clone(
        &self,
        application_id: i64,
        remote_url: &str,
        branch: &str,
        handler: Option<StreamHandler>,
    ) -> Result<String> {
        let app_dir = self.app_dir(application_id);
        let target = app_dir.to_string_lossy().to_string();
        Command::new(
            &self.work_dir,
            "git",
            &["clone", "--branch", branch, "--depth", "1", remote_url, &target],
        )
        .run(handler)
        .await
    }

    pub async fn pull(
        &self,
        application_id: i64,
        branch: &str,
        handler: Option<StreamHandler>,
    ) -> Result<String> {
        let app_dir = self.app_dir(application_id);

        Command::new(&app_dir, "git", &["checkout", branch])
            .run(handler.clone())
            .await?;
        Command::new(&app_dir, "git", &["pull", "origin", branch])
            .run(handler)
            .await
    }

    /// Full HEAD hash.
    pub async fn current_commit(&self, application_id: i64) -> Result<String> {
        let output = Command::new(&self.app_dir(application_id), "git", &["rev-parse", "HEAD"])
            .run(None)
            .await?;
        Ok(output.trim().to_string())
    }

    /// Subject of the HEAD commit.
    pub async fn commit_message(&self, application_id: i64) -> Result<String> {
        let output = Command::new(
            &self.app_dir(application_id),
            "git",
            &["log", "-1", "--pretty=%B"],
        )
        .run(None)
        .await?;
        Ok(output.trim().to_string())
    }

    pub async fn is_installed(&self) -> bool {
        tokio::process::Command::new("git")
            .arg("--version")
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
    fn test_app_dir_layout() {
        let git = GitManager::new(Path::new("/var/lib/horizonx"));
        assert_eq!(
            git.app_dir(42),
            PathBuf::from("/var/lib/horizonx/app-42")
        );
    }

    #[test]
    fn test_is_repo_false_for_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitManager::new(dir.path());
        assert!(!git.is_repo(1));
    }

    #[test]
    fn test_is_repo_detects_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitManager::new(dir.path());
        std::fs::create_dir_all(dir.path().join("app-1").join(".git")).unwrap();
        assert!(git.is_repo(1));
    }
}
