//! Execute node: one CLI run inside a fresh session folder.
//!
//! The run never fails outward. Every error after input resolution is
//! turned into an [`ExecuteOutput`] carrying the folder name (if one was
//! allocated), an `Execution error: …` response and failure metadata.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use chrono::{DateTime, Local};
use claude_nodes_core::{
    ArgumentMap, CUSTOM_COMMAND, CommandRunner, FailureKind, McpSignal, Model, NodeContext,
    NodeStatus, ProcessOutput, RunnerError, ToolConfig,
};
use claude_nodes_executor::{ClaudeInvocation, command::CommandBuildError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    folder::{FolderError, OutputFolders, SessionFolder, safe_relative},
    metadata::{
        ExecutionMetadata, FailureMetadata, METADATA_FILE, RAW_ERROR_FILE, RAW_OUTPUT_FILE,
        RunMetadata, write_if_present, write_json,
    },
};

/// Session folder prefix for execute runs.
pub const FOLDER_PREFIX: &str = "output";
/// Turn limit used when none is given.
pub const DEFAULT_MAX_TURNS: u32 = 8;
/// Placeholder command text.
pub const DEFAULT_COMMAND: &str = "# Claude Code Command\n\nYour command instructions here...";

const LISTED_FILES: usize = 5;

/// Execute error.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Folder(#[from] FolderError),
    #[error(transparent)]
    Command(#[from] CommandBuildError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExecuteError {
    /// Failure category reported in [`NodeStatus`].
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Folder(_) | Self::Write { .. } | Self::Runner(RunnerError::Io(_)) => {
                FailureKind::Io
            }
            Self::Command(_) => FailureKind::MalformedInput,
            Self::Runner(RunnerError::TimedOut(_)) => FailureKind::Timeout,
            Self::Runner(RunnerError::ExecutableNotFound(_) | RunnerError::SpawnFailed(_)) => {
                FailureKind::Spawn
            }
        }
    }
}

/// Where the command text comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum CommandSource {
    /// A preset file in the commands directory. The custom-command
    /// sentinel or an unreadable file falls back to the literal text.
    File(String),
    /// The literal command text.
    #[default]
    Text,
}

/// Inputs of the execute node.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    /// Host-assigned id used for progress messages.
    pub node_id: String,
    pub source: CommandSource,
    pub command: String,
    pub model: Model,
    pub max_turns: u32,
    pub memory: String,
    pub arguments: ArgumentMap,
    pub tools: ToolConfig,
    /// Name of an earlier session folder to reference.
    pub previous_output: String,
    pub mcp_config: Option<McpSignal>,
}

impl Default for ExecuteRequest {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            source: CommandSource::Text,
            command: DEFAULT_COMMAND.to_string(),
            model: Model::Default,
            max_turns: DEFAULT_MAX_TURNS,
            memory: String::new(),
            arguments: ArgumentMap::new(),
            tools: ToolConfig::execute_default(),
            previous_output: String::new(),
            mcp_config: None,
        }
    }
}

/// Outputs of the execute node.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteOutput {
    /// Session folder name; empty if allocation failed.
    pub folder: String,
    /// Standard output on success, otherwise an error message.
    pub response: String,
    pub metadata: RunMetadata,
    /// Non-sidecar files left in the folder.
    pub created_files: Vec<String>,
    pub status: NodeStatus,
}

/// Runs prompts through the CLI, one session folder per run.
#[derive(Clone)]
pub struct ExecuteNode {
    ctx: NodeContext,
    runner: Arc<dyn CommandRunner>,
    folders: OutputFolders,
}

impl ExecuteNode {
    #[must_use]
    pub fn new(ctx: NodeContext, runner: Arc<dyn CommandRunner>) -> Self {
        let folders = OutputFolders::new(ctx.config().output_root.clone());
        Self {
            ctx,
            runner,
            folders,
        }
    }

    /// Run the node.
    pub async fn execute(&self, request: &ExecuteRequest) -> ExecuteOutput {
        let id = request.node_id.as_str();
        self.ctx.progress(id, "Initializing Claude Code execution...");

        let command = self.resolve_command(request).await;
        let command = request.arguments.substitute(&command);
        let memory = if request.memory.is_empty() {
            String::new()
        } else {
            request.arguments.substitute(&request.memory)
        };
        let started = Local::now();

        let folder = match self.folders.allocate(FOLDER_PREFIX).await {
            Ok(folder) => folder,
            Err(e) => return self.failure(id, String::new(), &e.into(), started),
        };
        self.ctx
            .progress(id, format!("Created output folder: {}", folder.name));

        match self.run(request, &folder, &command, &memory, started).await {
            Ok(output) => output,
            Err(e) => self.failure(id, folder.name, &e, started),
        }
    }

    async fn run(
        &self,
        request: &ExecuteRequest,
        folder: &SessionFolder,
        command: &str,
        memory: &str,
        started: DateTime<Local>,
    ) -> Result<ExecuteOutput, ExecuteError> {
        let id = request.node_id.as_str();
        let mcp_setup_errors = request
            .mcp_config
            .as_ref()
            .map(|signal| self.mcp_preflight(id, signal))
            .unwrap_or_default();

        self.ctx.progress(id, "Building prompt...");
        let previous = self.folders.resolve(&request.previous_output);
        let prompt = build_prompt(command, memory, &folder.path, previous.as_deref());

        let invocation = ClaudeInvocation::new(request.max_turns)
            .model(request.model.clone())
            .tools(request.tools.clone());
        if !request.tools.tools().is_empty() {
            let names: Vec<&str> = request.tools.tools().iter().map(String::as_str).collect();
            self.ctx
                .progress(id, format!("Configuring tools: {}", names.join(", ")));
        }
        if request.tools.skip_permissions() {
            self.ctx.progress(id, "Skipping permission prompts");
        }
        let process = invocation
            .build(&self.ctx.config().cli_program)?
            .into_request()
            .stdin(prompt)
            .working_dir(&folder.path);
        tracing::debug!(args = ?process.args, folder = %folder.name, "Built CLI invocation");

        self.ctx.progress(id, "Executing Claude Code...");
        let clock = Instant::now();
        let output = self.runner.run(process).await?;
        let duration = clock.elapsed().as_secs_f64();
        tracing::info!(exit_code = output.exit_code, duration, "CLI run finished");

        let (response, status) = if output.success() {
            self.ctx.progress(
                id,
                format!("Execution completed successfully in {duration:.1}s"),
            );
            (output.stdout.clone(), NodeStatus::Ok)
        } else {
            self.ctx
                .progress(id, format!("Execution failed: {}", output.stderr));
            (
                format!("Error: {}", output.stderr),
                NodeStatus::failed(
                    FailureKind::ProcessExit,
                    format!("CLI exited with code {}", output.exit_code),
                ),
            )
        };

        let metadata = ExecutionMetadata {
            execution_time: duration,
            model: request.model.to_string(),
            max_turns: invocation.max_turns(),
            output_folder: folder.name.clone(),
            output_path: folder.path.display().to_string(),
            timestamp: started.to_rfc3339(),
            tools_used: request.tools.tools().iter().cloned().collect(),
            exit_code: output.exit_code,
            has_memory: !memory.is_empty(),
            has_arguments: !request.arguments.is_empty(),
            has_previous: !request.previous_output.trim().is_empty(),
            mcp_config_received: request.mcp_config.is_some(),
            mcp_setup_errors,
        };

        self.ctx.progress(id, "Saving execution metadata...");
        persist(&folder.path, &metadata, &output).await?;

        let created_files = OutputFolders::artifacts(&folder.path);
        if !created_files.is_empty() {
            self.ctx.progress(
                id,
                format!("Created files: {}", summarize_files(&created_files)),
            );
        }

        Ok(ExecuteOutput {
            folder: folder.name.clone(),
            response,
            metadata: RunMetadata::Completed(metadata),
            created_files,
            status,
        })
    }

    async fn resolve_command(&self, request: &ExecuteRequest) -> String {
        let CommandSource::File(name) = &request.source else {
            return request.command.clone();
        };
        if name == CUSTOM_COMMAND {
            return request.command.clone();
        }
        if let Some(text) = self.load_command_file(name).await {
            self.ctx
                .progress(&request.node_id, format!("Loaded command from: {name}"));
            text
        } else {
            self.ctx.progress(
                &request.node_id,
                "Failed to load command file, using custom command",
            );
            request.command.clone()
        }
    }

    async fn load_command_file(&self, name: &str) -> Option<String> {
        let path = self.ctx.config().commands_dir.join(safe_relative(name)?);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read command file: {e}");
                None
            }
        }
    }

    /// Interpret the MCP manager's signal. Problems are recorded, never fatal.
    fn mcp_preflight(&self, id: &str, signal: &McpSignal) -> Vec<String> {
        self.ctx.progress(id, "Setting up MCPs...");
        let errors = match signal {
            McpSignal::Enabled(name) => {
                self.ctx
                    .progress(id, format!("MCP '{name}' is configured and ready"));
                Vec::new()
            }
            McpSignal::Disabled(name) => vec![format!("MCP '{name}' was disabled")],
            McpSignal::Error(text) => vec![format!("MCP configuration error: {text}")],
            McpSignal::Listed | McpSignal::Config | McpSignal::Other(_) => Vec::new(),
        };
        if !errors.is_empty() {
            tracing::warn!(?errors, "MCP preflight reported problems");
        }
        errors
    }

    fn failure(
        &self,
        id: &str,
        folder: String,
        error: &ExecuteError,
        started: DateTime<Local>,
    ) -> ExecuteOutput {
        let message = format!("Execution error: {error}");
        tracing::error!(folder = %folder, "{message}");
        self.ctx.progress(id, &message);
        ExecuteOutput {
            response: message,
            metadata: RunMetadata::Failed(FailureMetadata {
                error: error.to_string(),
                execution_time: 0.0,
                output_folder: folder.clone(),
                timestamp: started.to_rfc3339(),
            }),
            folder,
            created_files: Vec::new(),
            status: NodeStatus::failed(error.kind(), error.to_string()),
        }
    }
}

/// Assemble the prompt piped to the CLI.
///
/// Sections, in order: memory, previous output (only when `previous` is
/// given), command, output instructions.
#[must_use]
pub fn build_prompt(
    command: &str,
    memory: &str,
    output_path: &Path,
    previous: Option<&Path>,
) -> String {
    let mut prompt = String::new();
    push_memory(&mut prompt, memory);
    if let Some(previous) = previous {
        push_previous(&mut prompt, previous);
    }
    prompt.push_str("# Command\n");
    prompt.push_str(command);
    prompt.push_str("\n\n");
    prompt.push_str("# Output Instructions\n");
    prompt.push_str(&format!(
        "Create all output files in: {}\nDo not create files elsewhere.",
        output_path.display()
    ));
    prompt
}

pub(crate) fn push_memory(prompt: &mut String, memory: &str) {
    if memory.is_empty() {
        return;
    }
    prompt.push_str("# Context/Memory\n");
    prompt.push_str(memory);
    prompt.push_str("\n\n");
}

pub(crate) fn push_previous(prompt: &mut String, previous: &Path) {
    prompt.push_str("# Previous Output\n");
    prompt.push_str(&format!(
        "Previous execution created files in: {}\nRead and understand these files as context.\n\n",
        previous.display()
    ));
}

async fn persist(
    folder: &Path,
    metadata: &ExecutionMetadata,
    output: &ProcessOutput,
) -> Result<(), ExecuteError> {
    let write_error = |path: PathBuf| move |source| ExecuteError::Write { path, source };

    let path = folder.join(METADATA_FILE);
    write_json(&path, metadata)
        .await
        .map_err(write_error(path.clone()))?;
    let path = folder.join(RAW_OUTPUT_FILE);
    write_if_present(&path, &output.stdout)
        .await
        .map_err(write_error(path.clone()))?;
    let path = folder.join(RAW_ERROR_FILE);
    write_if_present(&path, &output.stderr)
        .await
        .map_err(write_error(path.clone()))?;
    Ok(())
}

fn summarize_files(files: &[String]) -> String {
    let mut list = files
        .iter()
        .take(LISTED_FILES)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if files.len() > LISTED_FILES {
        list.push_str(&format!(" and {} more", files.len() - LISTED_FILES));
    }
    list
}
