//! Arguments builder node.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::payload::{ArgumentMap, NodeStatus};

/// Key added to the result when the JSON input cannot be parsed.
pub const ERROR_KEY: &str = "_error";

/// How the builder combines its inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentMode {
    /// Overlay a JSON object onto the base map.
    #[default]
    Json,
    /// Set a single key.
    KeyValue,
    /// Overlay a second serialized map.
    Merge,
}

impl fmt::Display for ArgumentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::KeyValue => "key_value",
            Self::Merge => "merge",
        })
    }
}

impl FromStr for ArgumentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "key_value" => Ok(Self::KeyValue),
            "merge" => Ok(Self::Merge),
            other => Err(format!("unknown argument mode: {other}")),
        }
    }
}

/// Inputs of the arguments builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgumentsRequest {
    pub mode: ArgumentMode,
    /// JSON object text (json mode).
    pub json_arguments: Option<String>,
    /// Key to set (`key_value` mode).
    pub key: String,
    /// Value to set (`key_value` mode).
    pub value: String,
    /// Serialized base map; invalid JSON is treated as empty.
    pub base_arguments: Option<String>,
    /// Serialized map to overlay (merge mode); invalid JSON is ignored.
    pub merge_arguments: Option<String>,
}

/// Outputs of the arguments builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentsOutput {
    /// The resulting map.
    pub arguments: ArgumentMap,
    /// Pretty JSON of `arguments`, for display and for string-typed hosts.
    pub arguments_json: String,
    pub status: NodeStatus,
}

/// Build an argument map. Never fails; malformed input degrades the output.
#[must_use]
pub fn build_arguments(request: &ArgumentsRequest) -> ArgumentsOutput {
    let mut result = request
        .base_arguments
        .as_deref()
        .map(ArgumentMap::parse_lenient)
        .unwrap_or_default();
    let mut status = NodeStatus::Ok;

    match request.mode {
        ArgumentMode::Json => {
            if let Some(text) = request.json_arguments.as_deref() {
                match ArgumentMap::parse(text) {
                    Ok(Some(parsed)) => result.overlay(parsed),
                    Ok(None) => {}
                    Err(e) => {
                        let message = format!("Invalid JSON: {e}");
                        tracing::warn!("{message}");
                        result.insert(ERROR_KEY, message.clone());
                        status = NodeStatus::degraded(message);
                    }
                }
            }
        }
        ArgumentMode::KeyValue => {
            if !request.key.is_empty() {
                result.insert(request.key.clone(), request.value.clone());
            }
        }
        ArgumentMode::Merge => {
            if let Some(text) = request.merge_arguments.as_deref() {
                result.overlay(ArgumentMap::parse_lenient(text));
            }
        }
    }

    let arguments_json = result.to_json_pretty();
    ArgumentsOutput {
        arguments: result,
        arguments_json,
        status,
    }
}
