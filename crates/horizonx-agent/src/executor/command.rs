// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Subprocess runner with line-streamed output.
//!
//! stdout and stderr are read concurrently, normalized (CRLF and lone CR
//! collapse to LF), split into lines, and handed to the caller's stream
//! handler as they arrive. The child is killed if the future is dropped,
//! which is how the 30 s job timeout cancels a runaway build.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as TokioCommand;

use horizonx_core::domain::LogStream;

use crate::error::{AgentError, Result};

/// Initial per-line buffer.
const INITIAL_LINE_BUFFER: usize = 4096;

/// Hard cap on one line; longer output fails the stream.
const MAX_LINE_BUFFER: usize = 10 * 1024 * 1024;

/// Callback receiving each non-empty output line.
pub type StreamHandler = Arc<dyn Fn(&str, LogStream) + Send + Sync>;

/// One subprocess invocation.
pub struct Command {
    work_dir: PathBuf,
    program: String,
    args: Vec<String>,
}

impl Command {
    pub fn new<S: Into<String>>(work_dir: &Path, program: S, args: &[&str]) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Run to completion, streaming lines to `handler`. Returns the full
    /// combined output; a non-zero exit is an error.
    pub async fn run(&self, handler: Option<StreamHandler>) -> Result<String> {
        let mut child = TokioCommand::new(&self.program)
            .args(&self.args)
            .current_dir(&self.work_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AgentError::CommandFailed(format!("failed to start {}: {}", self.program, e))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            AgentError::CommandFailed("stdout pipe unavailable".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            AgentError::CommandFailed("stderr pipe unavailable".to_string())
        })?;

        let output = Arc::new(Mutex::new(String::new()));

        let stdout_task = tokio::spawn(stream_lines(
            stdout,
            LogStream::Stdout,
            handler.clone(),
            output.clone(),
        ));
        let stderr_task = tokio::spawn(stream_lines(
            stderr,
            LogStream::Stderr,
            handler,
            output.clone(),
        ));

        let (stdout_result, stderr_result) = tokio::join!(stdout_task, stderr_task);
        let status = child.wait().await.map_err(|e| {
            AgentError::CommandFailed(format!("failed to wait for {}: {}", self.program, e))
        })?;

        let collected = output.lock().expect("output lock poisoned").clone();

        if !status.success() {
            return Err(AgentError::CommandFailed(format!(
                "{} {} exited with {}",
                self.program,
                self.args.join(" "),
                status
            )));
        }
        for result in [stdout_result, stderr_result] {
            result
                .map_err(|e| AgentError::CommandFailed(format!("stream task failed: {}", e)))??;
        }

        Ok(collected)
    }
}

async fn stream_lines<R: AsyncRead + Unpin>(
    reader: R,
    stream: LogStream,
    handler: Option<StreamHandler>,
    output: Arc<Mutex<String>>,
) -> Result<()> {
    let mut reader = BufReader::with_capacity(INITIAL_LINE_BUFFER, reader);
    let mut buffer = Vec::with_capacity(INITIAL_LINE_BUFFER);

    loop {
        buffer.clear();
        let read = reader
            .read_until(b'\n', &mut buffer)
            .await
            .map_err(AgentError::Io)?;
        if read == 0 {
            return Ok(());
        }
        if buffer.len() > MAX_LINE_BUFFER {
            return Err(AgentError::CommandFailed(format!(
                "output line exceeds {} bytes",
                MAX_LINE_BUFFER
            )));
        }

        let chunk = String::from_utf8_lossy(&buffer);
        for line in normalize_lines(&chunk) {
            {
                let mut collected = output.lock().expect("output lock poisoned");
                collected.push_str(&line);
                collected.push('\n');
            }
            if let Some(handler) = &handler {
                handler(&line, stream);
            }
        }
    }
}

/// Collapse CRLF and lone CR to LF, split, trim, and drop empty lines.
pub fn normalize_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_crlf_and_lone_cr() {
        assert_eq!(
            normalize_lines("one\r\ntwo\rthree\nfour"),
            vec!["one", "two", "three", "four"]
        );
    }

    #[test]
    fn test_normalize_drops_blank_lines() {
        assert_eq!(normalize_lines("a\n\n  \nb\n"), vec!["a", "b"]);
        assert!(normalize_lines("\r\n\r\n").is_empty());
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        assert_eq!(normalize_lines("  padded  \n"), vec!["padded"]);
    }

    #[tokio::test]
    async fn test_run_streams_stdout_lines() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let dir = tempfile::tempdir().unwrap();
        let lines = Arc::new(AtomicUsize::new(0));

        let counter = lines.clone();
        let handler: StreamHandler = Arc::new(move |line, stream| {
            assert_eq!(stream, LogStream::Stdout);
            assert!(!line.is_empty());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let command = Command::new(dir.path(), "sh", &["-c", "echo one; echo two"]);
        let output = command.run(Some(handler)).await.unwrap();

        assert_eq!(lines.load(Ordering::SeqCst), 2);
        assert!(output.contains("one"));
        assert!(output.contains("two"));
    }

    #[tokio::test]
    async fn test_run_reports_stderr_stream() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let dir = tempfile::tempdir().unwrap();
        let stderr_lines = Arc::new(AtomicUsize::new(0));

        let counter = stderr_lines.clone();
        let handler: StreamHandler = Arc::new(move |_line, stream| {
            if stream == LogStream::Stderr {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let command = Command::new(dir.path(), "sh", &["-c", "echo oops >&2"]);
        command.run(Some(handler)).await.unwrap();
        assert_eq!(stderr_lines.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_fails_on_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let command = Command::new(dir.path(), "sh", &["-c", "exit 3"]);
        let err = command.run(None).await.unwrap_err();
        assert!(matches!(err, AgentError::CommandFailed(_)));
    }

    #[tokio::test]
    async fn test_run_fails_on_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let command = Command::new(dir.path(), "definitely-not-a-real-binary", &[]);
        assert!(command.run(None).await.is_err());
    }
}
