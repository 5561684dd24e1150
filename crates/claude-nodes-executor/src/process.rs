//! Process runner backed by tokio process groups.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use claude_nodes_core::{CommandRunner, ProcessOutput, ProcessRequest, RunnerError};
use command_group::AsyncCommandGroup;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::Command,
    task::JoinHandle,
};

/// Runs requests as real child processes.
///
/// Each child gets its own process group so a timeout kills everything it
/// spawned, not just the direct child.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, RunnerError> {
        let executable = resolve_executable_path(&request.program)
            .await
            .ok_or_else(|| RunnerError::ExecutableNotFound(request.program.clone()))?;

        let mut cmd = Command::new(&executable);
        cmd.args(&request.args)
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(
            program = %executable.display(),
            args = ?request.args,
            cwd = ?request.working_dir,
            "Spawning process"
        );
        let mut child = cmd
            .group_spawn()
            .map_err(|e| RunnerError::SpawnFailed(format!("{}: {e}", executable.display())))?;

        // Write stdin on its own task so a child that fills its output pipes
        // before reading input cannot deadlock us.
        let mut stdin_task = match (child.inner().stdin.take(), request.stdin) {
            (Some(mut stdin), Some(input)) => Some(tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    tracing::debug!("Child closed stdin early: {e}");
                }
                drop(stdin);
            })),
            _ => None,
        };
        let mut stdout_task = spawn_reader(child.inner().stdout.take());
        let mut stderr_task = spawn_reader(child.inner().stderr.take());

        // The deadline covers draining too: a background grandchild can hold
        // the pipes open after the direct child exits.
        let finished = async {
            let status = child.wait().await?;
            if let Some(task) = stdin_task.as_mut() {
                let _ = task.await;
            }
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            Ok::<_, std::io::Error>((status, stdout, stderr))
        };

        let result = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, finished).await.ok(),
            None => Some(finished.await),
        };
        let Some(result) = result else {
            let limit = request.timeout.unwrap_or_default();
            tracing::warn!(
                program = %request.program,
                "Process timed out after {limit:?}, killing"
            );
            if let Err(e) = child.kill().await {
                tracing::debug!("Failed to kill timed-out process group: {e}");
            }
            stdout_task.abort();
            stderr_task.abort();
            if let Some(task) = stdin_task {
                task.abort();
            }
            return Err(RunnerError::TimedOut(limit));
        };

        let (status, stdout, stderr) = result?;
        let exit_code = status.code().unwrap_or(-1);
        tracing::debug!(exit_code, "Process exited");

        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

fn spawn_reader<R>(reader: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            if let Err(e) = reader.read_to_end(&mut buf).await {
                tracing::debug!("Error reading child output: {e}");
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Resolve an executable by name.
///
/// Absolute paths are accepted as-is when they exist; anything else is
/// looked up on `PATH`.
pub async fn resolve_executable_path(executable: &str) -> Option<PathBuf> {
    if executable.trim().is_empty() {
        return None;
    }

    let path = Path::new(executable);
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }

    let executable = executable.to_string();
    tokio::task::spawn_blocking(move || which::which(executable))
        .await
        .ok()
        .and_then(Result::ok)
}
