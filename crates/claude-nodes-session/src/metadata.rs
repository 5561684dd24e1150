//! Sidecar files written into session folders.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Prefix shared by every file the nodes write themselves.
pub const SIDECAR_PREFIX: &str = "_claude_";
/// Execution metadata, pretty JSON.
pub const METADATA_FILE: &str = "_claude_code_metadata.json";
/// Raw standard output of the CLI run.
pub const RAW_OUTPUT_FILE: &str = "_claude_raw_output.txt";
/// Raw standard error of the CLI run.
pub const RAW_ERROR_FILE: &str = "_claude_raw_error.txt";
/// Data file the scraper asks the CLI to produce.
pub const SCRAPE_DATA_FILE: &str = "reddit_data.json";
/// Summary file the scraper asks the CLI to produce.
pub const SCRAPE_SUMMARY_FILE: &str = "scraping_summary.txt";
/// Standard error of a failed scraper run.
pub const ERROR_LOG_FILE: &str = "error_log.txt";

/// Metadata recorded for a completed execute run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Wall-clock seconds.
    pub execution_time: f64,
    pub model: String,
    pub max_turns: u32,
    pub output_folder: String,
    pub output_path: String,
    /// Start time, RFC 3339.
    pub timestamp: String,
    pub tools_used: Vec<String>,
    pub exit_code: i32,
    pub has_memory: bool,
    pub has_arguments: bool,
    pub has_previous: bool,
    pub mcp_config_received: bool,
    pub mcp_setup_errors: Vec<String>,
}

/// Minimal metadata for a run that failed before completing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureMetadata {
    pub error: String,
    pub execution_time: f64,
    pub output_folder: String,
    pub timestamp: String,
}

/// Metadata returned by the execute node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunMetadata {
    Completed(ExecutionMetadata),
    Failed(FailureMetadata),
}

/// Metadata recorded for a completed scraper run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeMetadata {
    pub source_type: String,
    pub source: String,
    pub url: String,
    pub scrape_mode: String,
    pub max_items_requested: u32,
    pub items_scraped: usize,
    pub sort_by: String,
    pub time_filter: String,
    pub include_metadata: bool,
    pub duration_seconds: f64,
    pub timestamp: String,
    pub model: String,
    pub folder: String,
    pub files: Vec<String>,
}

/// Write `value` as two-space indented JSON.
///
/// # Errors
/// Returns error if serialization or the write fails.
pub async fn write_json<T: Serialize + Sync>(path: &Path, value: &T) -> std::io::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, text).await
}

/// Write `text` to `path` unless it is empty.
///
/// # Errors
/// Returns error if the write fails.
pub async fn write_if_present(path: &Path, text: &str) -> std::io::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    tokio::fs::write(path, text).await
}
