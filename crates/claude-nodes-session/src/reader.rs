//! Reader node: list or read files from an earlier session folder.

use std::path::{Path, PathBuf};

use claude_nodes_core::{FailureKind, NodeContext, NodeStatus};
use serde::{Deserialize, Serialize};

use crate::{
    folder::{OutputFolders, display_relative, safe_relative},
    metadata::METADATA_FILE,
};

/// Largest accepted file limit.
pub const MAX_FILES_LIMIT: usize = 100;

text_enum!(
    /// How the reader presents the matched files.
    ReadMode {
        ListFiles => "list_files",
        ReadAll => "read_all",
        ReadSpecific => "read_specific",
    }
    default ListFiles
);

/// Inputs of the reader node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub output_folder: String,
    /// Glob matched at any depth below the folder.
    pub file_pattern: String,
    pub mode: ReadMode,
    /// File read in [`ReadMode::ReadSpecific`], relative to the folder.
    pub specific_file: String,
    /// Clamped to `1..=100`.
    pub max_files: usize,
}

impl Default for ReadRequest {
    fn default() -> Self {
        Self {
            output_folder: String::new(),
            file_pattern: "*".to_string(),
            mode: ReadMode::ListFiles,
            specific_file: String::new(),
            max_files: 10,
        }
    }
}

/// One matched file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    /// Extension with its leading dot, or empty.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Outputs of the reader node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadOutput {
    pub file_contents: String,
    pub file_list: Vec<FileInfo>,
    /// Raw text of the metadata sidecar, or empty.
    pub metadata: String,
    pub status: NodeStatus,
}

impl ReadOutput {
    fn failed(kind: FailureKind, message: String, metadata: String) -> Self {
        Self {
            file_contents: message.clone(),
            file_list: Vec::new(),
            metadata,
            status: NodeStatus::failed(kind, message),
        }
    }
}

/// Reads session folders.
#[derive(Debug, Clone)]
pub struct ReaderNode {
    folders: OutputFolders,
}

impl ReaderNode {
    #[must_use]
    pub fn new(ctx: &NodeContext) -> Self {
        Self {
            folders: OutputFolders::new(ctx.config().output_root.clone()),
        }
    }

    /// Run the node.
    #[must_use]
    pub fn read(&self, request: &ReadRequest) -> ReadOutput {
        let Some(folder) = self.folders.resolve(&request.output_folder) else {
            return ReadOutput::failed(
                FailureKind::NotFound,
                format!("Error: Output folder '{}' not found", request.output_folder),
                String::new(),
            );
        };
        let metadata = std::fs::read_to_string(folder.join(METADATA_FILE)).unwrap_or_default();

        let files = match OutputFolders::matching_files(&folder, &request.file_pattern) {
            Ok(files) => files,
            Err(e) => {
                return ReadOutput::failed(
                    FailureKind::MalformedInput,
                    format!("Error: {e}"),
                    metadata,
                );
            }
        };
        let files: Vec<PathBuf> = files
            .into_iter()
            .filter(|f| !f.to_string_lossy().ends_with(METADATA_FILE))
            .take(request.max_files.clamp(1, MAX_FILES_LIMIT))
            .collect();
        let file_list: Vec<FileInfo> = files.iter().map(|f| file_info(&folder, f)).collect();
        tracing::debug!(folder = %folder.display(), matched = files.len(), "Reading output folder");

        let (file_contents, status) = match request.mode {
            ReadMode::ListFiles => (list_files(&request.output_folder, &file_list), NodeStatus::Ok),
            ReadMode::ReadAll => (read_all(&folder, &files), NodeStatus::Ok),
            ReadMode::ReadSpecific => read_specific(&folder, &request.specific_file),
        };

        ReadOutput {
            file_contents,
            file_list,
            metadata,
            status,
        }
    }
}

fn file_info(folder: &Path, file: &Path) -> FileInfo {
    FileInfo {
        path: display_relative(folder, file),
        size: std::fs::metadata(file).map_or(0, |m| m.len()),
        kind: file
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default(),
    }
}

fn list_files(name: &str, file_list: &[FileInfo]) -> String {
    let mut text = format!("Files in {name}:\n");
    for info in file_list {
        text.push_str(&format!("- {} ({} bytes)\n", info.path, info.size));
    }
    text
}

fn read_all(folder: &Path, files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|file| {
            let rel = display_relative(folder, file);
            match std::fs::read_to_string(file) {
                Ok(content) => format!("=== {rel} ===\n{content}\n"),
                Err(e) => format!("=== {rel} ===\nError reading file: {e}\n"),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn read_specific(folder: &Path, name: &str) -> (String, NodeStatus) {
    if name.is_empty() {
        return (String::new(), NodeStatus::Ok);
    }
    let path = safe_relative(name).map(|rel| folder.join(rel));
    match path {
        Some(path) if path.is_file() => match std::fs::read_to_string(&path) {
            Ok(content) => (content, NodeStatus::Ok),
            Err(e) => {
                let message = format!("Error reading file: {e}");
                (message.clone(), NodeStatus::failed(FailureKind::Io, message))
            }
        },
        _ => {
            let message = format!("File '{name}' not found in output folder");
            (
                message.clone(),
                NodeStatus::failed(FailureKind::NotFound, message),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::testing::context;

    fn fixture() -> (TempDir, ReaderNode) {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(dir.path());
        let folder = ctx.config().output_root.join("output_1");
        std::fs::create_dir_all(folder.join("src")).unwrap();
        std::fs::write(folder.join("README.md"), "# Demo").unwrap();
        std::fs::write(folder.join("src").join("main.py"), "print('hi')").unwrap();
        std::fs::write(folder.join(METADATA_FILE), r#"{"exit_code": 0}"#).unwrap();
        (dir, ReaderNode::new(&ctx))
    }

    #[test]
    fn test_missing_folder() {
        let (_dir, node) = fixture();
        let output = node.read(&ReadRequest {
            output_folder: "output_nope".into(),
            ..ReadRequest::default()
        });
        assert_eq!(output.file_contents, "Error: Output folder 'output_nope' not found");
        assert!(output.file_list.is_empty());
        assert!(output.metadata.is_empty());
        assert!(output.status.is_failed());
    }

    #[test]
    fn test_list_files_excludes_metadata() {
        let (_dir, node) = fixture();
        let output = node.read(&ReadRequest {
            output_folder: "output_1".into(),
            ..ReadRequest::default()
        });
        assert_eq!(output.file_list.len(), 2);
        assert_eq!(output.metadata, r#"{"exit_code": 0}"#);
        assert!(output.file_contents.starts_with("Files in output_1:\n"));
        assert!(output.file_contents.contains("- README.md (6 bytes)\n"));

        let readme = output
            .file_list
            .iter()
            .find(|f| f.path == "README.md")
            .unwrap();
        assert_eq!(readme.kind, ".md");
        let json = serde_json::to_value(readme).unwrap();
        assert_eq!(json["type"], ".md");
    }

    #[test]
    fn test_read_all_with_pattern_and_limit() {
        let (_dir, node) = fixture();
        let output = node.read(&ReadRequest {
            output_folder: "output_1".into(),
            file_pattern: "*.py".into(),
            mode: ReadMode::ReadAll,
            ..ReadRequest::default()
        });
        assert_eq!(output.file_list.len(), 1);
        assert!(output.file_contents.contains("main.py ===\nprint('hi')\n"));

        let limited = node.read(&ReadRequest {
            output_folder: "output_1".into(),
            max_files: 0,
            ..ReadRequest::default()
        });
        assert_eq!(limited.file_list.len(), 1);
    }

    #[test]
    fn test_read_specific() {
        let (_dir, node) = fixture();
        let mut request = ReadRequest {
            output_folder: "output_1".into(),
            mode: ReadMode::ReadSpecific,
            specific_file: "README.md".into(),
            ..ReadRequest::default()
        };
        assert_eq!(node.read(&request).file_contents, "# Demo");

        request.specific_file = "missing.txt".into();
        let output = node.read(&request);
        assert_eq!(
            output.file_contents,
            "File 'missing.txt' not found in output folder"
        );
        assert!(matches!(
            output.status,
            NodeStatus::Failed {
                kind: FailureKind::NotFound,
                ..
            }
        ));

        request.specific_file = "../output_1/README.md".into();
        assert!(node.read(&request).status.is_failed());
    }
}
