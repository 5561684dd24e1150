//! MCP server management through the CLI's own sub-commands.
//!
//! Registrations live in the CLI's user scope; this module only lists,
//! adds and removes them. Failures become an `McpSignal::Error` output
//! rather than propagating to the host.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use claude_nodes_core::{
    CommandRunner, FailureKind, McpSignal, NodeStatus, ProcessOutput, RunnerError,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use super::invocation::{mcp_add_args, mcp_list_args, mcp_remove_args};
use crate::command::{CommandBuildError, CommandBuilder};

/// MCP manager error.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("MCP name required")]
    NameRequired,
    #[error("Invalid JSON configuration: {0}")]
    InvalidConfig(#[source] serde_json::Error),
    #[error("Unexpected MCP list output: {0}")]
    InvalidList(#[source] serde_json::Error),
    #[error("CLI exited with code {code}: {stderr}")]
    CommandFailed { code: i32, stderr: String },
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    CommandBuild(#[from] CommandBuildError),
}

/// A registered MCP server as reported by `mcp list --json`.
///
/// Entries are read field by field so one oddly shaped entry does not hide
/// the rest of the list. `raw` keeps the entry exactly as the CLI printed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServer {
    pub name: String,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub raw: Value,
}

impl McpServer {
    /// Read one list entry. Missing or mistyped fields fall back to defaults;
    /// non-object entries yield `None`.
    #[must_use]
    pub fn from_value(raw: Value) -> Option<Self> {
        let entry = raw.as_object()?;
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let command = entry
            .get("command")
            .and_then(Value::as_str)
            .map(str::to_string);
        let args = entry
            .get("args")
            .and_then(Value::as_array)
            .map(|args| args.iter().map(scalar_text).collect())
            .unwrap_or_default();
        let env = entry
            .get("env")
            .and_then(Value::as_object)
            .map(|env| {
                env.iter()
                    .map(|(key, value)| (key.clone(), scalar_text(value)))
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            name,
            command,
            args,
            env,
            raw,
        })
    }
}

/// Strings verbatim, anything else as JSON text.
fn scalar_text(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_string)
}

/// Parse `mcp list --json` output, skipping entries that are not objects.
///
/// # Errors
/// Returns error if the text is not a JSON array.
pub fn parse_server_list(text: &str) -> Result<Vec<McpServer>, McpError> {
    let entries: Vec<Value> = serde_json::from_str(text).map_err(McpError::InvalidList)?;
    let total = entries.len();
    let servers: Vec<McpServer> = entries
        .into_iter()
        .filter_map(McpServer::from_value)
        .collect();
    if servers.len() < total {
        tracing::debug!(
            skipped = total - servers.len(),
            "Ignoring non-object MCP list entries"
        );
    }
    Ok(servers)
}

/// Manager action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpAction {
    #[default]
    List,
    Enable,
    Disable,
    /// Return example configurations without calling the CLI.
    Config,
}

impl FromStr for McpAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(Self::List),
            "enable" => Ok(Self::Enable),
            "disable" => Ok(Self::Disable),
            "config" => Ok(Self::Config),
            other => Err(format!("unknown MCP action: {other}")),
        }
    }
}

/// How `list` renders its info text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListFormat {
    #[default]
    Names,
    Full,
    Json,
}

impl FromStr for ListFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "names" => Ok(Self::Names),
            "full" => Ok(Self::Full),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown list format: {other}")),
        }
    }
}

/// Inputs of the MCP manager node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpRequest {
    pub action: McpAction,
    pub name: String,
    /// JSON registration for `enable`; blank means `{}`.
    pub config_json: String,
    pub list_format: ListFormat,
}

/// Outputs of the MCP manager node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpOutput {
    /// Displayable text.
    pub info: String,
    /// Signal for the execute node's preflight.
    pub signal: McpSignal,
    /// Server list or example configurations.
    pub data: Vec<Value>,
    pub status: NodeStatus,
}

impl McpOutput {
    fn failed(info: String, message: impl Into<String>) -> Self {
        Self {
            info,
            signal: McpSignal::error(),
            data: Vec::new(),
            status: NodeStatus::failed(FailureKind::Mcp, message),
        }
    }
}

/// Result of [`McpManager::ensure_registered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    AlreadyPresent,
    Added,
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyPresent => "already configured",
            Self::Added => "configured successfully",
        })
    }
}

/// Lists, registers and removes MCP servers via the CLI.
#[derive(Clone)]
pub struct McpManager {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl McpManager {
    /// Create a manager invoking `program` (the configured CLI base).
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    async fn call(&self, args: Vec<String>) -> Result<ProcessOutput, McpError> {
        let request = CommandBuilder::new(&self.program)
            .params(args)
            .build()?
            .into_request();
        tracing::debug!(
            program = %request.program,
            args = ?request.args,
            "Running MCP sub-command"
        );
        let output = self.runner.run(request).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(McpError::CommandFailed {
                code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }

    /// List registered servers.
    ///
    /// # Errors
    /// Returns error if the CLI fails or prints something other than a JSON list.
    pub async fn try_list_servers(&self) -> Result<Vec<McpServer>, McpError> {
        let output = self.call(mcp_list_args()).await?;
        parse_server_list(&output.stdout)
    }

    /// List registered servers; any failure yields an empty list.
    pub async fn list_servers(&self) -> Vec<McpServer> {
        match self.try_list_servers().await {
            Ok(servers) => servers,
            Err(e) => {
                tracing::warn!("Failed to list MCP servers: {e}");
                Vec::new()
            }
        }
    }

    /// Register a server in user scope.
    ///
    /// # Errors
    /// Returns error if the CLI rejects the registration.
    pub async fn add(&self, name: &str, config: &Value) -> Result<(), McpError> {
        if name.is_empty() {
            return Err(McpError::NameRequired);
        }
        self.call(mcp_add_args(name, &config.to_string())).await?;
        tracing::info!(name, "Registered MCP server");
        Ok(())
    }

    /// Remove a server from user scope.
    ///
    /// # Errors
    /// Returns error if the CLI rejects the removal.
    pub async fn remove(&self, name: &str) -> Result<(), McpError> {
        if name.is_empty() {
            return Err(McpError::NameRequired);
        }
        self.call(mcp_remove_args(name)).await?;
        tracing::info!(name, "Removed MCP server");
        Ok(())
    }

    /// Register `name` unless the list already contains it.
    ///
    /// A failing list call is treated as "absent".
    ///
    /// # Errors
    /// Returns error if registration is needed and fails.
    pub async fn ensure_registered(
        &self,
        name: &str,
        config: &Value,
    ) -> Result<Registration, McpError> {
        if self.list_servers().await.iter().any(|s| s.name == name) {
            return Ok(Registration::AlreadyPresent);
        }
        self.add(name, config).await?;
        Ok(Registration::Added)
    }

    /// Run the MCP manager node. Never fails; errors become an `error` signal.
    pub async fn manage(&self, request: &McpRequest) -> McpOutput {
        match request.action {
            McpAction::List => {
                let servers = self.list_servers().await;
                McpOutput {
                    info: format_servers(&servers, request.list_format),
                    signal: McpSignal::Listed,
                    data: to_values(&servers),
                    status: NodeStatus::Ok,
                }
            }
            McpAction::Enable => self.enable(request).await,
            McpAction::Disable => self.disable(request).await,
            McpAction::Config => {
                let examples = example_configs();
                let pretty = serde_json::to_string_pretty(&examples)
                    .unwrap_or_else(|_| examples.to_string());
                McpOutput {
                    info: format!("Example MCP Configurations:\n\n{pretty}"),
                    signal: McpSignal::Config,
                    data: vec![examples],
                    status: NodeStatus::Ok,
                }
            }
        }
    }

    async fn enable(&self, request: &McpRequest) -> McpOutput {
        if request.name.is_empty() {
            return McpOutput::failed("Error: MCP name required".into(), "MCP name required");
        }

        let config = if request.config_json.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            match serde_json::from_str::<Value>(&request.config_json) {
                Ok(value) => value,
                Err(e) => {
                    return McpOutput::failed(
                        "Error: Invalid JSON configuration".into(),
                        McpError::InvalidConfig(e).to_string(),
                    );
                }
            }
        };

        match self.add(&request.name, &config).await {
            Ok(()) => McpOutput {
                info: format!("Successfully enabled MCP: {}", request.name),
                signal: McpSignal::Enabled(request.name.clone()),
                data: to_values(&self.list_servers().await),
                status: NodeStatus::Ok,
            },
            Err(McpError::CommandFailed { stderr, .. }) => {
                McpOutput::failed(format!("Error enabling MCP: {stderr}"), stderr)
            }
            Err(e) => McpOutput::failed(format!("Error: {e}"), e.to_string()),
        }
    }

    async fn disable(&self, request: &McpRequest) -> McpOutput {
        if request.name.is_empty() {
            return McpOutput::failed("Error: MCP name required".into(), "MCP name required");
        }

        match self.remove(&request.name).await {
            Ok(()) => McpOutput {
                info: format!("Successfully disabled MCP: {}", request.name),
                signal: McpSignal::Disabled(request.name.clone()),
                data: to_values(&self.list_servers().await),
                status: NodeStatus::Ok,
            },
            Err(McpError::CommandFailed { stderr, .. }) => {
                McpOutput::failed(format!("Error disabling MCP: {stderr}"), stderr)
            }
            Err(e) => McpOutput::failed(format!("Error: {e}"), e.to_string()),
        }
    }
}

impl fmt::Debug for McpManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpManager")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

fn to_values(servers: &[McpServer]) -> Vec<Value> {
    servers.iter().map(|s| s.raw.clone()).collect()
}

/// Render a server list as names, details or JSON.
#[must_use]
pub fn format_servers(servers: &[McpServer], format: ListFormat) -> String {
    match format {
        ListFormat::Names => {
            let names: Vec<String> = servers.iter().map(|s| format!("- {}", s.name)).collect();
            format!("Configured MCPs:\n{}", names.join("\n"))
        }
        ListFormat::Full => {
            let mut lines = vec!["Configured MCPs:".to_string()];
            for server in servers {
                let name = if server.name.is_empty() { "Unknown" } else { &server.name };
                lines.push(format!("\n- {name}"));
                lines.push(format!(
                    "  Command: {}",
                    server.command.as_deref().unwrap_or("N/A")
                ));
                if !server.args.is_empty() {
                    lines.push(format!("  Args: {}", server.args.join(" ")));
                }
            }
            lines.join("\n")
        }
        ListFormat::Json => serde_json::to_string_pretty(&to_values(servers))
            .unwrap_or_else(|_| "[]".to_string()),
    }
}

/// Example registrations returned by the `config` action.
#[must_use]
pub fn example_configs() -> Value {
    json!({
        "slack": {
            "command": "npx",
            "args": ["-y", "slack-mcp-server@latest", "--transport", "stdio"],
            "env": {
                "SLACK_MCP_XOXC_TOKEN": "your-xoxc-token",
                "SLACK_MCP_XOXD_TOKEN": "your-xoxd-token"
            }
        },
        "browser-tools": {
            "command": "browser-tools-mcp"
        },
        "notion": {
            "command": "notion-mcp-server",
            "env": {
                "NOTION_TOKEN": "your-notion-token"
            }
        },
        "figma": {
            "command": "figma-developer-mcp",
            "args": ["--figma-api-key=your-api-key", "--stdio"]
        }
    })
}
