//! Memory/context builder node.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{config::NodesConfig, payload::NodeStatus};

/// Source of the memory text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryMode {
    /// Free text.
    #[default]
    Text,
    /// Contents of an arbitrary file.
    File,
    /// Contents of a curated file in the memories directory.
    MemoryFile,
    /// CLAUDE.md-style template content.
    ClaudeMd,
    /// Template, free text and file, each under its own heading.
    Combined,
}

impl fmt::Display for MemoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::File => "file",
            Self::MemoryFile => "memory_file",
            Self::ClaudeMd => "claude_md",
            Self::Combined => "combined",
        })
    }
}

impl FromStr for MemoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "file" => Ok(Self::File),
            "memory_file" => Ok(Self::MemoryFile),
            "claude_md" => Ok(Self::ClaudeMd),
            "combined" => Ok(Self::Combined),
            other => Err(format!("unknown memory mode: {other}")),
        }
    }
}

/// Inputs of the memory builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryRequest {
    pub mode: MemoryMode,
    pub text: String,
    pub file_path: Option<PathBuf>,
    /// File name inside the configured memories directory.
    pub memory_file: Option<String>,
    pub claude_md_content: String,
    /// Previous memory; prepended with a blank line.
    pub append_to: Option<String>,
}

/// Outputs of the memory builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryOutput {
    pub memory: String,
    pub status: NodeStatus,
}

/// Build memory text. File problems are embedded in the text, never raised.
#[must_use]
pub fn build_memory(config: &NodesConfig, request: &MemoryRequest) -> MemoryOutput {
    let mut parts: Vec<String> = Vec::new();
    let mut problems: Vec<String> = Vec::new();

    if let Some(previous) = request.append_to.as_deref().filter(|p| !p.is_empty()) {
        parts.push(previous.to_string());
        parts.push("\n\n".to_string());
    }

    match request.mode {
        MemoryMode::Text => {
            if !request.text.is_empty() {
                parts.push(request.text.clone());
            }
        }
        MemoryMode::File => {
            if let Some(path) = request.file_path.as_deref().filter(|p| !p.as_os_str().is_empty()) {
                parts.push(read_or_describe(path, &mut problems));
            }
        }
        MemoryMode::MemoryFile => {
            if let Some(name) = request.memory_file.as_deref().filter(|n| !n.is_empty()) {
                let path = config.memories_dir.join(name);
                if path.is_file() {
                    parts.push(read_or_describe(&path, &mut problems));
                } else {
                    let message = format!("Error: Memory file not found: {name}");
                    problems.push(message.clone());
                    parts.push(message);
                }
            }
        }
        MemoryMode::ClaudeMd => {
            if !request.claude_md_content.is_empty() {
                parts.push(request.claude_md_content.clone());
            }
        }
        MemoryMode::Combined => {
            if !request.claude_md_content.is_empty() {
                parts.push(request.claude_md_content.clone());
                parts.push("\n\n".to_string());
            }
            if !request.text.is_empty() {
                parts.push("## Additional Context\n\n".to_string());
                parts.push(request.text.clone());
                parts.push("\n\n".to_string());
            }
            if let Some(path) = request.file_path.as_deref().filter(|p| p.exists()) {
                match std::fs::read_to_string(path) {
                    Ok(content) => {
                        parts.push("## File Content\n\n".to_string());
                        parts.push(content);
                    }
                    Err(e) => {
                        let message = format!("Error reading file: {e}");
                        problems.push(message.clone());
                        parts.push(message);
                    }
                }
            }
        }
    }

    let memory = parts.concat().trim().to_string();
    let status = if problems.is_empty() {
        NodeStatus::Ok
    } else {
        NodeStatus::degraded(problems.join("; "))
    };

    MemoryOutput { memory, status }
}

fn read_or_describe(path: &Path, problems: &mut Vec<String>) -> String {
    if !path.exists() {
        let message = format!("Error: File not found: {}", path.display());
        problems.push(message.clone());
        return message;
    }
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to read memory file: {e}");
            let message = format!("Error reading file {}: {e}", path.display());
            problems.push(message.clone());
            message
        }
    }
}
