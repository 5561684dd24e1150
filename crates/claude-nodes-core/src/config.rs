//! Configuration and per-node execution context.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::traits::{ProgressSink, TracingProgress};

/// File name searched for in the current directory.
pub const CONFIG_FILE_NAME: &str = "claude-nodes.toml";

/// Default timeout for the scraper node.
pub const DEFAULT_SCRAPER_TIMEOUT_SECS: u64 = 600;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Directories and program settings shared by every node.
///
/// All paths are explicit; nothing is resolved against the current
/// directory after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodesConfig {
    /// Root under which session folders are allocated.
    pub output_root: PathBuf,
    /// Directory scanned for command preset files.
    pub commands_dir: PathBuf,
    /// Directory scanned for curated memory files.
    pub memories_dir: PathBuf,
    /// External CLI invocation, split with shell rules (e.g. `npx claude`).
    pub cli_program: String,
    /// Wall-clock limit for scraper runs.
    pub scraper_timeout_secs: u64,
}

impl Default for NodesConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::rooted_at(&cwd)
    }
}

impl NodesConfig {
    /// Configuration with every directory placed under `base`.
    #[must_use]
    pub fn rooted_at(base: &Path) -> Self {
        Self {
            output_root: base.join("claude_code_outputs"),
            commands_dir: base.join("commands"),
            memories_dir: base.join("memories"),
            cli_program: "claude".to_string(),
            scraper_timeout_secs: DEFAULT_SCRAPER_TIMEOUT_SECS,
        }
    }

    /// Parse configuration from TOML text. Missing keys take defaults.
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML for this schema.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a file.
    ///
    /// Relative directories are resolved against the file's parent.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(parent) = path.parent() {
            config.resolve_relative(parent);
        }
        Ok(config)
    }

    /// Find and load configuration.
    ///
    /// Search order:
    /// 1. `explicit`, when given.
    /// 2. `./claude-nodes.toml`.
    /// 3. `<config dir>/claude-nodes/config.toml`.
    /// 4. Defaults rooted at the current directory.
    ///
    /// # Errors
    /// Returns error if a discovered file cannot be read or parsed.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            let absolute = std::env::current_dir()
                .map(|cwd| cwd.join(&local))
                .unwrap_or(local);
            return Self::load(&absolute);
        }

        if let Some(user) = dirs::config_dir().map(|d| d.join("claude-nodes").join("config.toml")) {
            if user.is_file() {
                return Self::load(&user);
            }
        }

        Ok(Self::default())
    }

    /// Scraper timeout as a `Duration`.
    #[must_use]
    pub const fn scraper_timeout(&self) -> Duration {
        Duration::from_secs(self.scraper_timeout_secs)
    }

    fn resolve_relative(&mut self, base: &Path) {
        for dir in [
            &mut self.output_root,
            &mut self.commands_dir,
            &mut self.memories_dir,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}

/// Context handed to every node at construction.
#[derive(Clone)]
pub struct NodeContext {
    config: Arc<NodesConfig>,
    progress: Arc<dyn ProgressSink>,
}

impl NodeContext {
    /// Create a context with an explicit progress sink.
    #[must_use]
    pub fn new(config: NodesConfig, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            config: Arc::new(config),
            progress,
        }
    }

    /// Create a context that reports progress through `tracing` only.
    #[must_use]
    pub fn with_tracing(config: NodesConfig) -> Self {
        Self::new(config, Arc::new(TracingProgress))
    }

    /// Shared configuration.
    #[must_use]
    pub fn config(&self) -> &NodesConfig {
        &self.config
    }

    /// Report progress for a node. Never fails.
    pub fn progress(&self, node_id: &str, message: impl AsRef<str>) {
        self.progress.report(node_id, message.as_ref());
    }
}

impl fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_defaults() {
        let config = NodesConfig::rooted_at(Path::new("/srv/graph"));
        assert_eq!(config.output_root, PathBuf::from("/srv/graph/claude_code_outputs"));
        assert_eq!(config.commands_dir, PathBuf::from("/srv/graph/commands"));
        assert_eq!(config.cli_program, "claude");
        assert_eq!(config.scraper_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = NodesConfig::from_toml_str("cli_program = \"npx claude\"\n").unwrap();
        assert_eq!(config.cli_program, "npx claude");
        assert_eq!(config.scraper_timeout_secs, DEFAULT_SCRAPER_TIMEOUT_SECS);
    }

    #[test]
    fn test_load_resolves_relative_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "output_root = \"out\"\ncommands_dir = \"/abs/commands\"\nscraper_timeout_secs = 30\n",
        )
        .unwrap();

        let config = NodesConfig::load(&path).unwrap();
        assert_eq!(config.output_root, dir.path().join("out"));
        assert_eq!(config.commands_dir, PathBuf::from("/abs/commands"));
        assert_eq!(config.scraper_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_toml() {
        let err = NodesConfig::from_toml_str("scraper_timeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = NodesConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
