//! Typed payloads exchanged between nodes.
//!
//! Each type keeps its legacy text form (`Display` / `FromStr`) so hosts
//! that only pass strings between nodes keep working.

use std::{collections::BTreeSet, convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Marker separating the tool list from the permission flag.
const SKIP_MARKER: &str = "|skip_permissions:";

/// Key→value table used for `${KEY}` substitution.
///
/// Insertion order is preserved; overlaying an existing key keeps its
/// original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentMap(Map<String, Value>);

impl ArgumentMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object.
    ///
    /// Non-object JSON parses to `Ok(None)`.
    ///
    /// # Errors
    /// Returns error if `text` is not valid JSON.
    pub fn parse(text: &str) -> Result<Option<Self>, serde_json::Error> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Ok(Some(Self(map))),
            _ => Ok(None),
        }
    }

    /// Parse a JSON object, treating blank, invalid or non-object text as empty.
    #[must_use]
    pub fn parse_lenient(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::new();
        }
        Self::parse(text).ok().flatten().unwrap_or_default()
    }

    /// Set a key.
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    /// Overlay every entry of `other` onto this map.
    pub fn overlay(&mut self, other: Self) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Pretty JSON (two-space indent).
    #[must_use]
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// Replace every `${KEY}` placeholder in `text`.
    ///
    /// String values are inserted verbatim, other values as JSON text.
    #[must_use]
    pub fn substitute(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (key, value) in &self.0 {
            let placeholder = format!("${{{key}}}");
            if !result.contains(&placeholder) {
                continue;
            }
            let replacement = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            result = result.replace(&placeholder, &replacement);
        }
        result
    }
}

impl From<Map<String, Value>> for ArgumentMap {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Allowed tool set plus the permission-bypass flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    tools: BTreeSet<String>,
    skip_permissions: bool,
}

impl ToolConfig {
    /// Create a configuration. Blank tool names are dropped.
    #[must_use]
    pub fn new<I, S>(tools: I, skip_permissions: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tools = tools
            .into_iter()
            .map(Into::into)
            .map(|t: String| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            tools,
            skip_permissions,
        }
    }

    /// Tools the execute node grants when no configuration is supplied.
    #[must_use]
    pub fn execute_default() -> Self {
        Self::new(
            ["Read", "Write", "Edit", "MultiEdit", "Bash", "Grep", "Glob"],
            false,
        )
    }

    /// Allowed tools, sorted.
    #[must_use]
    pub const fn tools(&self) -> &BTreeSet<String> {
        &self.tools
    }

    /// Whether interactive permission prompts are bypassed.
    #[must_use]
    pub const fn skip_permissions(&self) -> bool {
        self.skip_permissions
    }

    /// Comma-joined tool names.
    #[must_use]
    pub fn tool_list(&self) -> String {
        self.tools.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for ToolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SKIP_MARKER}{}", self.tool_list(), self.skip_permissions)
    }
}

impl FromStr for ToolConfig {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tools, skip) = match s.split_once(SKIP_MARKER) {
            Some((tools, flag)) => (tools, flag.trim().eq_ignore_ascii_case("true")),
            None => (s, false),
        };
        Ok(Self::new(tools.split(','), skip))
    }
}

/// Status signal emitted by the MCP manager and consumed by the execute node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", content = "value", rename_all = "snake_case")]
pub enum McpSignal {
    /// A server was registered.
    Enabled(String),
    /// A server was removed.
    Disabled(String),
    /// Servers were listed.
    Listed,
    /// Example configurations were returned.
    Config,
    /// The manager failed; carries the raw text.
    Error(String),
    /// Unrecognized text, treated as informational.
    Other(String),
}

impl McpSignal {
    /// The manager's own failure tag.
    #[must_use]
    pub fn error() -> Self {
        Self::Error("error".to_string())
    }
}

impl fmt::Display for McpSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled(name) => write!(f, "enabled:{name}"),
            Self::Disabled(name) => write!(f, "disabled:{name}"),
            Self::Listed => f.write_str("listed"),
            Self::Config => f.write_str("config"),
            Self::Error(text) | Self::Other(text) => f.write_str(text),
        }
    }
}

impl FromStr for McpSignal {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(name) = s.strip_prefix("enabled:") {
            return Ok(Self::Enabled(name.to_string()));
        }
        if let Some(name) = s.strip_prefix("disabled:") {
            return Ok(Self::Disabled(name.to_string()));
        }
        Ok(match s {
            "listed" => Self::Listed,
            "config" => Self::Config,
            _ if s.to_lowercase().contains("error") => Self::Error(s.to_string()),
            _ => Self::Other(s.to_string()),
        })
    }
}

/// Model selection for the external CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    /// Let the CLI choose; no flag is emitted.
    #[default]
    Default,
    Sonnet,
    Opus,
    /// Any other model name, passed through.
    Named(String),
}

impl Model {
    /// Value for `--model`, or `None` for the CLI default.
    #[must_use]
    pub fn flag_value(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::Sonnet => Some("sonnet"),
            Self::Opus => Some("opus"),
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag_value().unwrap_or("default"))
    }
}

impl FromStr for Model {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "" | "default" => Self::Default,
            "sonnet" => Self::Sonnet,
            "opus" => Self::Opus,
            other => Self::Named(other.to_string()),
        })
    }
}

/// Category of a failed node run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Input could not be interpreted.
    MalformedInput,
    /// The external process exited non-zero.
    ProcessExit,
    /// The external process exceeded its time limit.
    Timeout,
    /// The external process could not be started.
    Spawn,
    /// A named folder or file does not exist.
    NotFound,
    /// Filesystem failure.
    Io,
    /// External MCP registration failed.
    Mcp,
}

/// Outcome of a node run, alongside its displayable outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeStatus {
    /// Completed normally.
    Ok,
    /// Completed with usable but degraded output.
    Degraded { message: String },
    /// Failed; outputs carry error text only.
    Failed { kind: FailureKind, message: String },
}

impl NodeStatus {
    /// Shorthand for a failure.
    #[must_use]
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a degraded result.
    #[must_use]
    pub fn degraded(message: impl Into<String>) -> Self {
        Self::Degraded {
            message: message.into(),
        }
    }

    /// Whether the run failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
