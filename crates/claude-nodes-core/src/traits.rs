//! Core traits for process execution and progress reporting.

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single external process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    /// Program to run (resolved against `PATH` by the runner).
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Text piped to standard input, if any.
    pub stdin: Option<String>,
    /// Working directory for the child.
    pub working_dir: Option<PathBuf>,
    /// Wall-clock limit. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl ProcessRequest {
    /// Create a request with no input, working directory or timeout.
    #[must_use]
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stdin: None,
            working_dir: None,
            timeout: None,
        }
    }

    /// Pipe text to the child's standard input.
    #[must_use]
    pub fn stdin<S: Into<String>>(mut self, input: S) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Run the child inside `dir`.
    #[must_use]
    pub fn working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Kill the child after `timeout`.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the child was terminated by a signal.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the process exited with code zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runner error.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),
    #[error("Process timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for running external processes.
///
/// The production implementation lives in `claude-nodes-executor`; tests
/// substitute scripted runners.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a process to completion (or until its timeout elapses).
    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, RunnerError>;
}

/// Fire-and-forget progress reporting to the host.
///
/// Implementations must never block or fail the calling node.
pub trait ProgressSink: Send + Sync {
    /// Report a progress message for the node identified by `node_id`.
    fn report(&self, node_id: &str, message: &str);
}

/// Progress sink that only emits `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, node_id: &str, message: &str) {
        tracing::info!(node_id, "{message}");
    }
}
