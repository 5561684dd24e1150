//! Session folder allocation and lookup.

use std::path::{Component, Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use uuid::Uuid;

use crate::metadata::SIDECAR_PREFIX;

/// Folder error.
#[derive(Debug, Error)]
pub enum FolderError {
    #[error("Failed to create output folder {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid folder pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// A freshly allocated session folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFolder {
    /// Folder name, relative to the output root.
    pub name: String,
    /// Absolute path.
    pub path: PathBuf,
}

/// Allocates and resolves session folders under one root.
#[derive(Debug, Clone)]
pub struct OutputFolders {
    root: PathBuf,
}

impl OutputFolders {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create `<prefix>_<YYYYMMDD_HHMMSS>_<8 hex>` under the root.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub async fn allocate(&self, prefix: &str) -> Result<SessionFolder, FolderError> {
        let name = folder_name(prefix);
        let path = self.root.join(&name);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| FolderError::Create {
                path: path.clone(),
                source,
            })?;
        tracing::info!(folder = %name, "Allocated output folder");
        Ok(SessionFolder { name, path })
    }

    /// Path of an existing session folder.
    ///
    /// Names that are empty, absolute or step outside the root resolve to
    /// `None`, as do folders that do not exist.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = safe_relative(name)?;
        let path = self.root.join(relative);
        path.is_dir().then_some(path)
    }

    /// Files below `folder` matching `pattern` at any depth, in sorted order.
    ///
    /// Directories are skipped. The folder path itself is escaped, so only
    /// `pattern` is interpreted.
    ///
    /// # Errors
    /// Returns error if `pattern` is not a valid glob.
    pub fn matching_files(folder: &Path, pattern: &str) -> Result<Vec<PathBuf>, FolderError> {
        let escaped = glob::Pattern::escape(&folder.to_string_lossy());
        let full = format!("{escaped}/**/{pattern}");
        let mut files: Vec<PathBuf> = glob::glob(&full)?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Top-level artifact names in `folder`, sidecars excluded, sorted.
    #[must_use]
    pub fn artifacts(folder: &Path) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(folder) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with(SIDECAR_PREFIX))
            .collect();
        names.sort();
        names
    }

    /// Every regular file name in `folder`, sorted.
    #[must_use]
    pub fn files(folder: &Path) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(folder) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn folder_name(prefix: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{timestamp}_{}", &suffix[..8])
}

/// Accept only plain relative paths made of normal components.
pub(crate) fn safe_relative(name: &str) -> Option<&Path> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    let path = Path::new(trimmed);
    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then_some(path)
}

/// Path of `file` relative to `folder`, for display.
pub(crate) fn display_relative(folder: &Path, file: &Path) -> String {
    file.strip_prefix(folder)
        .unwrap_or(file)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_allocate_unique_names() {
        let dir = TempDir::new().unwrap();
        let folders = OutputFolders::new(dir.path().join("outputs"));

        let mut names = HashSet::new();
        for _ in 0..20 {
            let folder = folders.allocate("output").await.unwrap();
            assert!(folder.path.is_dir());
            assert!(folder.path.starts_with(folders.root()));
            assert!(names.insert(folder.name));
        }
    }

    #[test]
    fn test_folder_name_shape() {
        let name = folder_name("reddit_scrape");
        let rest = name.strip_prefix("reddit_scrape_").unwrap();
        let parts: Vec<&str> = rest.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("output_a")).unwrap();
        let folders = OutputFolders::new(dir.path());

        assert!(folders.resolve("output_a").is_some());
        assert!(folders.resolve("missing").is_none());
        assert!(folders.resolve("").is_none());
        assert!(folders.resolve("../output_a").is_none());
        assert!(folders.resolve("/etc").is_none());
    }

    #[test]
    fn test_matching_files_recursive() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join("src")).unwrap();
        std::fs::write(root.join("a.py"), "a").unwrap();
        std::fs::write(root.join("src").join("b.py"), "b").unwrap();
        std::fs::write(root.join("notes.md"), "n").unwrap();

        let files = OutputFolders::matching_files(root, "*.py").unwrap();
        let rel: Vec<String> = files.iter().map(|f| display_relative(root, f)).collect();
        assert_eq!(rel.len(), 2);
        assert!(rel.contains(&"a.py".to_string()));
        assert!(rel.iter().any(|p| p.ends_with("b.py") && p.starts_with("src")));

        let all = OutputFolders::matching_files(root, "*").unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_artifacts_skip_sidecars() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("report.md"), "").unwrap();
        std::fs::write(dir.path().join("_claude_code_metadata.json"), "{}").unwrap();
        std::fs::write(dir.path().join("_claude_raw_output.txt"), "x").unwrap();

        assert_eq!(OutputFolders::artifacts(dir.path()), vec!["report.md"]);
        assert_eq!(OutputFolders::files(dir.path()).len(), 3);
    }
}
