//! Context node: turn a session folder back into memory text.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use claude_nodes_core::{FailureKind, NodeContext, NodeStatus};
use serde::Serialize;
use serde_json::Value;

use crate::{
    folder::{OutputFolders, display_relative},
    metadata::METADATA_FILE,
};

/// Extensions included when no filter is given.
pub const DEFAULT_FILE_FILTER: &str = "*.py,*.js,*.ts,*.md,*.txt,*.json";
/// Template used by [`ContextMode::Custom`] when none is given.
pub const DEFAULT_TEMPLATE: &str = "# Previous Output\n\n\
    The following files were generated:\n{file_list}\n\n\
    Key files:\n{file_contents}";

const KEY_FILES: usize = 5;
const SUMMARY_CHARS: usize = 1000;

text_enum!(
    /// Shape of the produced memory.
    ContextMode {
        FullContent => "full_content",
        FileList => "file_list",
        Summary => "summary",
        Custom => "custom",
    }
    default Summary
);

/// Inputs of the context node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRequest {
    /// Session folder; empty yields `base_memory` unchanged.
    pub output_folder: String,
    pub mode: ContextMode,
    /// Prepended, followed by a blank line.
    pub base_memory: String,
    /// Comma-separated globs or bare extensions (`py` means `*.py`).
    pub file_filter: String,
    /// Supports `{file_list}`, `{file_contents}`, `{metadata}` and `{output_folder}`.
    pub custom_template: String,
    /// Files above this size (clamped to `1..=1000` KB) are not read.
    pub max_file_size_kb: u64,
}

impl Default for ContextRequest {
    fn default() -> Self {
        Self {
            output_folder: String::new(),
            mode: ContextMode::Summary,
            base_memory: String::new(),
            file_filter: DEFAULT_FILE_FILTER.to_string(),
            custom_template: DEFAULT_TEMPLATE.to_string(),
            max_file_size_kb: 100,
        }
    }
}

/// Outputs of the context node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextOutput {
    pub memory: String,
    pub status: NodeStatus,
}

/// Builds memory text from session folders.
#[derive(Debug, Clone)]
pub struct ContextNode {
    folders: OutputFolders,
}

struct Collected {
    file_list: String,
    contents: Vec<(String, String)>,
    metadata: String,
}

impl ContextNode {
    #[must_use]
    pub fn new(ctx: &NodeContext) -> Self {
        Self {
            folders: OutputFolders::new(ctx.config().output_root.clone()),
        }
    }

    /// Run the node.
    #[must_use]
    pub fn build(&self, request: &ContextRequest) -> ContextOutput {
        let name = request.output_folder.trim();
        if name.is_empty() {
            return ContextOutput {
                memory: request.base_memory.clone(),
                status: NodeStatus::Ok,
            };
        }
        let Some(folder) = self.folders.resolve(name) else {
            let message = format!("Error: Output folder '{}' not found", request.output_folder);
            return ContextOutput {
                memory: message.clone(),
                status: NodeStatus::failed(FailureKind::NotFound, message),
            };
        };

        let limit = request.max_file_size_kb.clamp(1, 1000) * 1024;
        let collected = collect(&folder, &request.file_filter, limit);
        tracing::debug!(
            folder = name,
            files = collected.contents.len(),
            mode = %request.mode,
            "Building context"
        );

        let mut memory = String::new();
        if !request.base_memory.is_empty() {
            memory.push_str(&request.base_memory);
            memory.push_str("\n\n");
        }
        match request.mode {
            ContextMode::FullContent => {
                memory.push_str(&format!("# Files from {name}\n\n"));
                for (path, content) in &collected.contents {
                    memory.push_str(&fenced(&format!("## {path}"), content));
                }
            }
            ContextMode::FileList => {
                memory.push_str(&format!("# Files created in {name}\n\n"));
                memory.push_str(&collected.file_list);
                memory.push('\n');
                if !collected.metadata.is_empty() {
                    memory.push_str("## Execution Metadata\n\n```json\n");
                    memory.push_str(&collected.metadata);
                    memory.push_str("\n```\n");
                }
            }
            ContextMode::Summary => {
                memory.push_str(&format!("# Previous execution: {name}\n\n"));
                memory.push_str("## Files created:\n");
                memory.push_str(&collected.file_list);
                memory.push('\n');
                if !collected.contents.is_empty() {
                    memory.push_str("## Key file contents:\n\n");
                    for (path, content) in collected.contents.iter().take(KEY_FILES) {
                        memory.push_str(&fenced(&format!("### {path}"), &truncate(content)));
                    }
                }
            }
            ContextMode::Custom => {
                if !request.custom_template.is_empty() {
                    let key_files: String = collected
                        .contents
                        .iter()
                        .take(KEY_FILES)
                        .map(|(path, content)| fenced(&format!("### {path}"), content))
                        .collect();
                    let formatted = request
                        .custom_template
                        .replace("{file_list}", &collected.file_list)
                        .replace("{file_contents}", &key_files)
                        .replace("{metadata}", &collected.metadata)
                        .replace("{output_folder}", name);
                    memory.push_str(&formatted);
                }
            }
        }

        ContextOutput {
            memory,
            status: NodeStatus::Ok,
        }
    }
}

fn collect(folder: &Path, filter: &str, limit: u64) -> Collected {
    let mut files = BTreeSet::<PathBuf>::new();
    for ext in filter.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let pattern = if ext.starts_with('*') {
            ext.to_string()
        } else {
            format!("*.{ext}")
        };
        match OutputFolders::matching_files(folder, &pattern) {
            Ok(found) => files.extend(found),
            Err(e) => tracing::warn!(pattern = %pattern, "Skipping file filter: {e}"),
        }
    }

    let mut file_list = String::new();
    let mut contents = Vec::new();
    for file in files {
        if file.file_name().is_some_and(|n| n == METADATA_FILE) {
            continue;
        }
        let rel = display_relative(folder, &file);
        let size = std::fs::metadata(&file).map_or(0, |m| m.len());
        file_list.push_str(&format!("- {rel} ({size} bytes)\n"));
        let content = if size <= limit {
            std::fs::read_to_string(&file).unwrap_or_else(|e| format!("[Error reading file: {e}]"))
        } else {
            format!("[File too large: {size} bytes]")
        };
        contents.push((rel, content));
    }

    Collected {
        file_list,
        contents,
        metadata: read_metadata(folder),
    }
}

/// Pretty-printed metadata sidecar; unparsable text is passed through.
fn read_metadata(folder: &Path) -> String {
    let Ok(text) = std::fs::read_to_string(folder.join(METADATA_FILE)) else {
        return String::new();
    };
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or(text)
}

fn fenced(heading: &str, content: &str) -> String {
    format!("{heading}\n\n```\n{content}\n```\n\n")
}

fn truncate(content: &str) -> String {
    if content.chars().count() <= SUMMARY_CHARS {
        return content.to_string();
    }
    let head: String = content.chars().take(SUMMARY_CHARS).collect();
    format!("{head}\n... [truncated]")
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::testing::context;

    fn fixture() -> (TempDir, ContextNode) {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(dir.path());
        let folder = ctx.config().output_root.join("output_1");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("app.py"), "print(1)").unwrap();
        std::fs::write(folder.join("notes.md"), "x".repeat(1500)).unwrap();
        std::fs::write(folder.join("image.png"), [0u8; 4]).unwrap();
        std::fs::write(folder.join(METADATA_FILE), r#"{"exit_code":0}"#).unwrap();
        (dir, ContextNode::new(&ctx))
    }

    fn request(mode: ContextMode) -> ContextRequest {
        ContextRequest {
            output_folder: "output_1".into(),
            mode,
            ..ContextRequest::default()
        }
    }

    #[test]
    fn test_empty_folder_returns_base_memory() {
        let (_dir, node) = fixture();
        let output = node.build(&ContextRequest {
            base_memory: "keep me".into(),
            ..ContextRequest::default()
        });
        assert_eq!(output.memory, "keep me");
        assert_eq!(output.status, NodeStatus::Ok);
    }

    #[test]
    fn test_missing_folder() {
        let (_dir, node) = fixture();
        let output = node.build(&ContextRequest {
            output_folder: "output_zzz".into(),
            ..ContextRequest::default()
        });
        assert_eq!(output.memory, "Error: Output folder 'output_zzz' not found");
        assert!(output.status.is_failed());
    }

    #[test]
    fn test_summary_truncates_and_filters() {
        let (_dir, node) = fixture();
        let mut req = request(ContextMode::Summary);
        req.base_memory = "Base".into();
        let memory = node.build(&req).memory;

        assert!(
            memory.starts_with("Base\n\n# Previous execution: output_1\n\n## Files created:\n")
        );
        assert!(memory.contains("- app.py (8 bytes)\n"));
        assert!(memory.contains("- notes.md (1500 bytes)\n"));
        assert!(!memory.contains("image.png"));
        assert!(!memory.contains(METADATA_FILE));
        assert!(memory.contains(&format!(
            "### notes.md\n\n```\n{}\n... [truncated]\n```",
            "x".repeat(1000)
        )));
    }

    #[test]
    fn test_file_list_includes_pretty_metadata() {
        let (_dir, node) = fixture();
        let memory = node.build(&request(ContextMode::FileList)).memory;
        assert!(memory.starts_with("# Files created in output_1\n\n"));
        assert!(
            memory.contains("## Execution Metadata\n\n```json\n{\n  \"exit_code\": 0\n}\n```\n")
        );
    }

    #[test]
    fn test_full_content_and_size_cap() {
        let (_dir, node) = fixture();
        let mut req = request(ContextMode::FullContent);
        req.file_filter = "md, py".into();
        req.max_file_size_kb = 1;
        let memory = node.build(&req).memory;
        assert!(memory.contains("## app.py\n\n```\nprint(1)\n```\n\n"));
        assert!(memory.contains("## notes.md\n\n```\n[File too large: 1500 bytes]\n```"));
    }

    #[test]
    fn test_custom_template() {
        let (_dir, node) = fixture();
        let mut req = request(ContextMode::Custom);
        req.custom_template = "From {output_folder}:\n{file_list}".into();
        req.file_filter = "py".into();
        let memory = node.build(&req).memory;
        assert_eq!(memory, "From output_1:\n- app.py (8 bytes)\n");

        req.custom_template = String::new();
        assert_eq!(node.build(&req).memory, "");
    }
}
