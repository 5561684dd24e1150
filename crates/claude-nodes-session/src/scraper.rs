//! Scraper node: browser-driven Reddit extraction through the Playwright MCP.
//!
//! Same protocol as the execute node with a fixed prompt, a fixed tool
//! grant and a wall-clock limit. After the CLI exits (or is killed) the
//! node reads back the data and summary files it asked for.

use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Local;
use claude_nodes_core::{
    CommandRunner, FailureKind, Model, NodeContext, NodeStatus, RunnerError, ToolConfig,
};
use claude_nodes_executor::{
    ClaudeInvocation, McpManager,
    claude::{McpError, mcp::Registration},
    command::CommandBuildError,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::{
    execute::{push_memory, push_previous},
    folder::{FolderError, OutputFolders, SessionFolder},
    metadata::{
        ERROR_LOG_FILE, METADATA_FILE, SCRAPE_DATA_FILE, SCRAPE_SUMMARY_FILE, ScrapeMetadata,
        write_if_present, write_json,
    },
};

/// Session folder prefix for scraper runs.
pub const FOLDER_PREFIX: &str = "reddit_scrape";
/// MCP server the scraper depends on.
pub const PLAYWRIGHT_SERVER: &str = "playwright";
/// Tool name granted to the CLI.
pub const PLAYWRIGHT_TOOL: &str = "mcp__playwright";
/// Turn limit for scraper runs.
pub const SCRAPE_MAX_TURNS: u32 = 15;

const PLAYWRIGHT_FAILED: &str = "Failed to configure Playwright MCP";
const NO_DATA: &str = "No data found";

/// Scrape error.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Mcp(#[from] McpError),
    #[error(transparent)]
    Folder(#[from] FolderError),
    #[error(transparent)]
    Command(#[from] CommandBuildError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScrapeError {
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Mcp(_) => FailureKind::Mcp,
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

text_enum!(
    /// Kind of Reddit source.
    SourceType { Url => "url", Subreddit => "subreddit", Search => "search", User => "user" }
    default Subreddit
);

text_enum!(
    /// What to extract.
    ScrapeMode { Comments => "comments", Posts => "posts", Both => "both", Metadata => "metadata" }
    default Comments
);

text_enum!(
    /// Listing sort order (subreddit sources only).
    SortBy {
        Hot => "hot",
        New => "new",
        Top => "top",
        Rising => "rising",
        Controversial => "controversial",
    }
    default Hot
);

text_enum!(
    /// Time window for `top` and `controversial` listings.
    TimeFilter {
        Hour => "hour",
        Day => "day",
        Week => "week",
        Month => "month",
        Year => "year",
        All => "all",
    }
    default Day
);

/// Inputs of the scraper node.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub node_id: String,
    pub source_type: SourceType,
    /// URL, subreddit name, search query or username.
    pub source: String,
    pub scrape_mode: ScrapeMode,
    /// Clamped to `1..=100`.
    pub max_items: u32,
    pub model: Model,
    pub sort_by: SortBy,
    pub time_filter: TimeFilter,
    pub include_metadata: bool,
    /// Clamped to `1..=10`.
    pub max_comment_depth: u32,
    pub memory: String,
    pub previous_output: String,
}

impl Default for ScrapeRequest {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            source_type: SourceType::Subreddit,
            source: "programming".to_string(),
            scrape_mode: ScrapeMode::Comments,
            max_items: 10,
            model: Model::Sonnet,
            sort_by: SortBy::Hot,
            time_filter: TimeFilter::Day,
            include_metadata: true,
            max_comment_depth: 2,
            memory: String::new(),
            previous_output: String::new(),
        }
    }
}

impl ScrapeRequest {
    /// Address the CLI is told to open.
    #[must_use]
    pub fn target_url(&self) -> String {
        let source = self.source.trim();
        match self.source_type {
            SourceType::Url => self.source.clone(),
            SourceType::Subreddit => {
                let name = strip_prefixes(source, &["/r/", "r/"]);
                match self.sort_by {
                    SortBy::Top | SortBy::Controversial => format!(
                        "https://reddit.com/r/{name}/{}/?t={}",
                        self.sort_by, self.time_filter
                    ),
                    _ => format!("https://reddit.com/r/{name}/{}/", self.sort_by),
                }
            }
            SourceType::Search => {
                let query = serde_urlencoded::to_string([("q", source)]).unwrap_or_default();
                format!("https://reddit.com/search/?{query}")
            }
            SourceType::User => {
                let name = strip_prefixes(source, &["/u/", "u/"]);
                format!("https://reddit.com/user/{name}")
            }
        }
    }

    fn item_limit(&self) -> u32 {
        self.max_items.clamp(1, 100)
    }

    fn comment_depth(&self) -> u32 {
        self.max_comment_depth.clamp(1, 10)
    }
}

fn strip_prefixes<'a>(text: &'a str, prefixes: &[&str]) -> &'a str {
    prefixes
        .iter()
        .find_map(|p| text.strip_prefix(p))
        .unwrap_or(text)
}

/// Metadata attached to a scraper session output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SessionMetadata {
    Completed(ScrapeMetadata),
    Partial { error: String, partial_data: bool },
}

/// Session-shaped output, or an error when no usable session exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScrapeSession {
    Session {
        folder: String,
        response: String,
        metadata: SessionMetadata,
    },
    Error {
        error: String,
    },
}

/// Outputs of the scraper node.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOutput {
    pub output: ScrapeSession,
    pub scraped_data: Value,
    pub summary: String,
    pub item_count: usize,
    pub status: NodeStatus,
}

impl ScrapeOutput {
    fn failed(kind: FailureKind, message: String) -> Self {
        Self {
            output: ScrapeSession::Error {
                error: message.clone(),
            },
            scraped_data: Value::Object(Map::new()),
            summary: message.clone(),
            item_count: 0,
            status: NodeStatus::failed(kind, message),
        }
    }
}

/// What was found in a session folder after a scraper run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedData {
    pub data: Value,
    pub summary: String,
    pub item_count: usize,
}

/// Scrapes Reddit into session folders.
#[derive(Clone)]
pub struct ScraperNode {
    ctx: NodeContext,
    runner: Arc<dyn CommandRunner>,
    mcp: McpManager,
    folders: OutputFolders,
}

impl ScraperNode {
    #[must_use]
    pub fn new(ctx: NodeContext, runner: Arc<dyn CommandRunner>) -> Self {
        let mcp = McpManager::new(Arc::clone(&runner), ctx.config().cli_program.clone());
        let folders = OutputFolders::new(ctx.config().output_root.clone());
        Self {
            ctx,
            runner,
            mcp,
            folders,
        }
    }

    /// Run the node.
    pub async fn scrape(&self, request: &ScrapeRequest) -> ScrapeOutput {
        let id = request.node_id.as_str();
        self.ctx.progress(id, "Initializing Reddit scraper...");

        if let Err(e) = self.ensure_playwright(id).await {
            tracing::warn!("Playwright MCP unavailable: {e}");
            return ScrapeOutput::failed(FailureKind::Mcp, PLAYWRIGHT_FAILED.to_string());
        }

        let folder = match self.folders.allocate(FOLDER_PREFIX).await {
            Ok(folder) => folder,
            Err(e) => return self.error_output(id, &e.into()),
        };
        self.ctx
            .progress(id, format!("Created output folder: {}", folder.name));

        let url = request.target_url();
        self.ctx.progress(id, format!("Target URL: {url}"));

        match self.run(request, &folder, &url).await {
            Ok(output) => output,
            Err(ScrapeError::Runner(RunnerError::TimedOut(limit))) => {
                self.timed_out(id, &folder, limit).await
            }
            Err(e) => self.error_output(id, &e),
        }
    }

    async fn ensure_playwright(&self, id: &str) -> Result<(), ScrapeError> {
        let config = json!({ "command": "playwright-mcp-server" });
        match self.mcp.ensure_registered(PLAYWRIGHT_SERVER, &config).await {
            Ok(registration) => {
                if registration == Registration::Added {
                    tracing::info!("Registered Playwright MCP");
                }
                self.ctx
                    .progress(id, format!("Playwright MCP {registration}"));
                Ok(())
            }
            Err(e) => {
                self.ctx
                    .progress(id, format!("{PLAYWRIGHT_FAILED}: {e}"));
                Err(e.into())
            }
        }
    }

    async fn run(
        &self,
        request: &ScrapeRequest,
        folder: &SessionFolder,
        url: &str,
    ) -> Result<ScrapeOutput, ScrapeError> {
        let id = request.node_id.as_str();
        let previous = self.folders.resolve(&request.previous_output);
        let prompt = build_scraping_prompt(request, url, &folder.path, previous.as_deref());

        let process = ClaudeInvocation::new(SCRAPE_MAX_TURNS)
            .model(request.model.clone())
            .tools(ToolConfig::new([PLAYWRIGHT_TOOL], true))
            .build(&self.ctx.config().cli_program)?
            .into_request()
            .stdin(prompt)
            .working_dir(&folder.path)
            .timeout(self.ctx.config().scraper_timeout());

        self.ctx
            .progress(id, format!("Scraping Reddit ({})...", request.scrape_mode));
        let clock = Instant::now();
        let output = self.runner.run(process).await?;
        let duration = clock.elapsed().as_secs_f64();

        let mut warning = None;
        if !output.success() {
            let message = format!("Warning: Command exited with code {}", output.exit_code);
            self.ctx.progress(id, &message);
            let path = folder.path.join(ERROR_LOG_FILE);
            write_if_present(&path, &output.stderr)
                .await
                .map_err(|source| ScrapeError::Write { path, source })?;
            warning = Some(message);
        }

        let scraped = read_scraped_data(&folder.path).await;
        if scraped.item_count > 0 {
            self.ctx.progress(
                id,
                format!("Successfully scraped {} items", scraped.item_count),
            );
        } else {
            self.ctx.progress(id, "Scraping completed but no data found");
        }

        let metadata = ScrapeMetadata {
            source_type: request.source_type.to_string(),
            source: request.source.clone(),
            url: url.to_string(),
            scrape_mode: request.scrape_mode.to_string(),
            max_items_requested: request.item_limit(),
            items_scraped: scraped.item_count,
            sort_by: request.sort_by.to_string(),
            time_filter: request.time_filter.to_string(),
            include_metadata: request.include_metadata,
            duration_seconds: duration,
            timestamp: Local::now().to_rfc3339(),
            model: request.model.to_string(),
            folder: folder.name.clone(),
            files: OutputFolders::files(&folder.path),
        };
        let path = folder.path.join(METADATA_FILE);
        write_json(&path, &metadata)
            .await
            .map_err(|source| ScrapeError::Write { path, source })?;

        let status = match warning {
            Some(message) => NodeStatus::degraded(message),
            None if scraped.item_count == 0 => NodeStatus::degraded(NO_DATA),
            None => NodeStatus::Ok,
        };
        tracing::info!(folder = %folder.name, items = scraped.item_count, "Scrape finished");

        Ok(ScrapeOutput {
            output: ScrapeSession::Session {
                folder: folder.name.clone(),
                response: scraped.summary.clone(),
                metadata: SessionMetadata::Completed(metadata),
            },
            scraped_data: scraped.data,
            summary: scraped.summary,
            item_count: scraped.item_count,
            status,
        })
    }

    /// Salvage whatever the killed run left behind.
    async fn timed_out(&self, id: &str, folder: &SessionFolder, limit: Duration) -> ScrapeOutput {
        let message = timeout_message(limit);
        tracing::warn!(folder = %folder.name, "{message}");
        self.ctx.progress(id, &message);

        let scraped = read_scraped_data(&folder.path).await;
        if scraped.item_count == 0 {
            return ScrapeOutput::failed(FailureKind::Timeout, message);
        }
        let count = scraped.item_count;
        ScrapeOutput {
            output: ScrapeSession::Session {
                folder: folder.name.clone(),
                response: format!("Partial data scraped before timeout: {count} items"),
                metadata: SessionMetadata::Partial {
                    error: message.clone(),
                    partial_data: true,
                },
            },
            scraped_data: scraped.data,
            summary: format!("Timeout - partial data: {count} items"),
            item_count: count,
            status: NodeStatus::degraded(message),
        }
    }

    fn error_output(&self, id: &str, error: &ScrapeError) -> ScrapeOutput {
        let message = format!("Scraping error: {error}");
        tracing::error!("{message}");
        self.ctx.progress(id, &message);
        ScrapeOutput::failed(error.kind(), message)
    }
}

fn timeout_message(limit: Duration) -> String {
    let secs = limit.as_secs();
    let span = match secs {
        60 => "1 minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{s} seconds"),
    };
    format!("Scraping timeout after {span} - Reddit might be slow or the request is too complex")
}

/// Item count of scraped data.
///
/// Arrays count their elements; objects count their `posts` (or else
/// `data`) field, falling back to 1 for unknown shapes.
#[must_use]
pub fn count_items(data: &Value) -> usize {
    match data {
        Value::Array(items) => items.len(),
        Value::Object(map) => map
            .get("posts")
            .or_else(|| map.get("data"))
            .map_or(1, value_len),
        _ => 0,
    }
}

fn value_len(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        _ => 0,
    }
}

/// Read the data and summary files from a session folder.
pub async fn read_scraped_data(folder: &Path) -> ScrapedData {
    let data_path = folder.join(SCRAPE_DATA_FILE);
    let (data, item_count) = match tokio::fs::read_to_string(&data_path).await {
        Ok(text) => match serde_json::from_str::<Value>(&text) {
            Ok(value) => {
                let count = count_items(&value);
                (value, count)
            }
            Err(e) => (read_failure(&e), 0),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Value::Object(Map::new()), 0),
        Err(e) => (read_failure(&e), 0),
    };

    let mut summary = tokio::fs::read_to_string(folder.join(SCRAPE_SUMMARY_FILE))
        .await
        .map_or_else(|_| NO_DATA.to_string(), |s| s.trim().to_string());
    if item_count > 0 && summary.starts_with("No data") {
        summary = format!("Successfully scraped {item_count} items");
    }

    ScrapedData {
        data,
        summary,
        item_count,
    }
}

fn read_failure(error: &dyn std::error::Error) -> Value {
    json!({ "error": format!("Failed to read data file: {error}") })
}

/// Assemble the scraping instructions piped to the CLI.
#[must_use]
pub fn build_scraping_prompt(
    request: &ScrapeRequest,
    url: &str,
    output_path: &Path,
    previous: Option<&Path>,
) -> String {
    let max_items = request.item_limit();
    let mut prompt = String::new();
    push_memory(&mut prompt, &request.memory);
    if let Some(previous) = previous {
        push_previous(&mut prompt, previous);
    }

    prompt.push_str("# Command\n");
    prompt.push_str(&format!(
        "Use the Playwright MCP to scrape Reddit data from: {url}\n\n"
    ));
    prompt.push_str(
        "## Scraping Instructions:\n\
         1. Navigate to the URL\n\
         2. Wait for the page to load completely\n\
         3. Scrape the following data:\n",
    );

    if matches!(request.scrape_mode, ScrapeMode::Posts | ScrapeMode::Both) {
        prompt.push_str(&format!("\n### Posts (first {max_items} items):\n"));
        prompt.push_str("- Title\n- URL/link\n- Subreddit\n");
        if request.include_metadata {
            prompt.push_str(
                "- Author username\n\
                 - Score/upvotes\n\
                 - Number of comments\n\
                 - Post time\n\
                 - Awards (if any)\n\
                 - Post flair\n\
                 - Whether it's pinned/stickied\n",
            );
        }
    }

    if matches!(request.scrape_mode, ScrapeMode::Comments | ScrapeMode::Both) {
        if request.scrape_mode == ScrapeMode::Comments {
            prompt.push_str(&format!(
                "\n### Comments (from first {max_items} posts):\n"
            ));
            prompt.push_str(
                "- Find the post with the most comments (at least 20+ comments)\n\
                 - Click into that specific post to view the full comment thread\n",
            );
        } else {
            prompt.push_str("\n### Comments (for each scraped post):\n- Click into each post\n");
        }
        prompt.push_str(&format!(
            "- Scrape ALL visible comments up to {} levels deep\n",
            request.comment_depth()
        ));
        prompt.push_str(COMMENT_FIELDS);
    }

    if request.scrape_mode == ScrapeMode::Metadata {
        prompt.push_str(
            "\n### Subreddit Metadata:\n\
             - Subreddit name and description\n\
             - Member count\n\
             - Rules\n\
             - Moderators (if visible)\n\
             - Pinned posts\n\
             - Sidebar information\n",
        );
    }

    prompt.push_str(DATA_PROCESSING);
    prompt.push_str("\n# Output Instructions\n");
    prompt.push_str(&format!(
        "Save all scraped data to a file named '{SCRAPE_DATA_FILE}' in: {}\n",
        output_path.display()
    ));
    prompt.push_str(&format!(
        "Also create a '{SCRAPE_SUMMARY_FILE}' file with:\n"
    ));
    prompt.push_str(SUMMARY_CONTENTS);
    prompt.push_str("\nDo not create files elsewhere.\n");
    prompt
}

const COMMENT_FIELDS: &str = "\
- For each comment, capture:
  * Full comment text (don't truncate)
  * Author username
  * Score/upvotes
  * Timestamp
  * Comment ID (if available)
  * Parent comment ID (to preserve threading)
  * Depth level (0=top-level, 1=reply, 2=reply-to-reply, etc.)
  * Awards (if any)
  * Whether it's highlighted/pinned
- Expand 'Continue this thread' links to get deeper comments
- Include deleted/removed comments with appropriate markers
- Preserve the exact thread hierarchy in nested structure
";

const DATA_PROCESSING: &str = r#"
## Data Processing:
- Structure the data as clean JSON with this format:
```json
{
  "post": {
    "title": "...",
    "url": "...",
    "author": "...",
    "score": 123,
    "content": "...",
    "num_comments": 45
  },
  "comments": [
    {
      "id": "abc123",
      "parent_id": null,
      "author": "username",
      "text": "Full comment text...",
      "score": 10,
      "timestamp": "2 hours ago",
      "depth": 0,
      "awards": 1,
      "is_highlighted": false,
      "replies": [
        {
          "id": "def456",
          "parent_id": "abc123",
          "author": "another_user",
          "text": "Reply text...",
          "score": 5,
          "timestamp": "1 hour ago",
          "depth": 1,
          "replies": []
        }
      ]
    }
  ],
  "metadata": {
    "total_comments_scraped": 45,
    "max_depth_reached": 3,
    "scraped_at": "2024-06-16T16:00:00Z"
  }
}
```
- Use consistent field names
- Handle missing data gracefully (use null)
- Include a summary count of items scraped
- If any errors occur, include them in an 'errors' field
"#;

const SUMMARY_CONTENTS: &str = "\
- Post title and URL
- Total comments scraped
- Top 5 comments by score (with author and score)
- Most controversial comments (lowest/negative scores)
- Thread depth statistics
- Key discussion themes or topics mentioned
- Any issues encountered
- Timestamp of scraping
";

#[cfg(test)]
mod tests {
    use claude_nodes_core::{ProcessOutput, ProcessRequest};
    use tempfile::TempDir;

    use super::*;
    use crate::testing::{ScriptedRunner, context, exited, messages};

    fn listed_with_playwright() -> ProcessOutput {
        exited(0, r#"[{"name":"playwright","command":"playwright-mcp-server"}]"#, "")
    }

    fn write_results(req: &ProcessRequest, data: &str, summary: Option<&str>) {
        let cwd = req.working_dir.as_ref().unwrap();
        std::fs::write(cwd.join(SCRAPE_DATA_FILE), data).unwrap();
        if let Some(summary) = summary {
            std::fs::write(cwd.join(SCRAPE_SUMMARY_FILE), summary).unwrap();
        }
    }

    #[test]
    fn test_count_items() {
        assert_eq!(count_items(&json!({"posts": [1, 2, 3]})), 3);
        assert_eq!(count_items(&json!([1, 2])), 2);
        assert_eq!(count_items(&json!({"foo": 1})), 1);
        assert_eq!(count_items(&json!({"data": [1]})), 1);
        assert_eq!(count_items(&json!("text")), 0);
    }

    #[test]
    fn test_target_url_rules() {
        let mut request = ScrapeRequest {
            source: "/r/rust".into(),
            ..ScrapeRequest::default()
        };
        assert_eq!(request.target_url(), "https://reddit.com/r/rust/hot/");

        request.source = "r/rust".into();
        request.sort_by = SortBy::Top;
        request.time_filter = TimeFilter::Week;
        assert_eq!(request.target_url(), "https://reddit.com/r/rust/top/?t=week");

        // Names that merely start with "r" are kept whole.
        request.source = "rust".into();
        request.sort_by = SortBy::New;
        assert_eq!(request.target_url(), "https://reddit.com/r/rust/new/");

        request.source_type = SourceType::Search;
        request.source = "async rust & tokio".into();
        assert_eq!(
            request.target_url(),
            "https://reddit.com/search/?q=async+rust+%26+tokio"
        );

        request.source_type = SourceType::User;
        request.source = "/u/ferris".into();
        assert_eq!(request.target_url(), "https://reddit.com/user/ferris");

        request.source_type = SourceType::Url;
        request.source = "https://old.reddit.com/r/rust/comments/abc".into();
        assert_eq!(request.target_url(), "https://old.reddit.com/r/rust/comments/abc");
    }

    #[test]
    fn test_text_enums() {
        assert_eq!("controversial".parse::<SortBy>().unwrap(), SortBy::Controversial);
        assert_eq!(TimeFilter::All.to_string(), "all");
        assert!("sideways".parse::<ScrapeMode>().is_err());
        assert_eq!(SourceType::default(), SourceType::Subreddit);
        assert_eq!(SortBy::ALL.len(), 5);
    }

    #[test]
    fn test_prompt_sections_by_mode() {
        let out = Path::new("/out/reddit_scrape_x");
        let comments = build_scraping_prompt(&ScrapeRequest::default(), "U", out, None);
        assert!(comments.starts_with(
            "# Command\nUse the Playwright MCP to scrape Reddit data from: U\n\n"
        ));
        assert!(comments.contains("### Comments (from first 10 posts):"));
        assert!(comments.contains("up to 2 levels deep"));
        assert!(!comments.contains("### Posts"));
        assert!(comments.contains(
            "Save all scraped data to a file named 'reddit_data.json' in: /out/reddit_scrape_x\n"
        ));
        assert!(comments.ends_with("\nDo not create files elsewhere.\n"));

        let posts = ScrapeRequest {
            scrape_mode: ScrapeMode::Posts,
            include_metadata: false,
            max_items: 500,
            memory: "M".into(),
            ..ScrapeRequest::default()
        };
        let posts = build_scraping_prompt(&posts, "U", out, None);
        assert!(posts.starts_with("# Context/Memory\nM\n\n# Command\n"));
        assert!(posts.contains("### Posts (first 100 items):"));
        assert!(!posts.contains("Author username"));
        assert!(!posts.contains("### Comments"));

        let meta = ScrapeRequest {
            scrape_mode: ScrapeMode::Metadata,
            ..ScrapeRequest::default()
        };
        assert!(build_scraping_prompt(&meta, "U", out, None).contains("### Subreddit Metadata:"));
    }

    #[tokio::test]
    async fn test_read_back_summaries() {
        let dir = TempDir::new().unwrap();
        let empty = read_scraped_data(dir.path()).await;
        assert_eq!(empty.summary, "No data found");
        assert_eq!(empty.item_count, 0);
        assert_eq!(empty.data, json!({}));

        std::fs::write(dir.path().join(SCRAPE_DATA_FILE), "[1,2]").unwrap();
        let generated = read_scraped_data(dir.path()).await;
        assert_eq!(generated.summary, "Successfully scraped 2 items");

        std::fs::write(dir.path().join(SCRAPE_SUMMARY_FILE), "  Great thread  \n").unwrap();
        assert_eq!(read_scraped_data(dir.path()).await.summary, "Great thread");

        std::fs::write(dir.path().join(SCRAPE_DATA_FILE), "{broken").unwrap();
        let broken = read_scraped_data(dir.path()).await;
        assert_eq!(broken.item_count, 0);
        assert!(
            broken.data["error"]
                .as_str()
                .unwrap()
                .starts_with("Failed to read data file: ")
        );
    }

    #[tokio::test]
    async fn test_successful_scrape() {
        let dir = TempDir::new().unwrap();
        let (ctx, store) = context(dir.path());
        let runner = ScriptedRunner::new()
            .then_output(listed_with_playwright())
            .then(|req| {
                write_results(req, r#"{"posts":[{"title":"a"},{"title":"b"}]}"#, Some("Two posts"));
                Ok(exited(0, "ok", ""))
            })
            .into_arc();
        let node = ScraperNode::new(ctx, runner.clone());

        let output = node.scrape(&ScrapeRequest::default()).await;
        assert_eq!(output.item_count, 2);
        assert_eq!(output.summary, "Two posts");
        assert_eq!(output.status, NodeStatus::Ok);
        let ScrapeSession::Session { folder, metadata, .. } = &output.output else {
            panic!("expected a session");
        };
        assert!(folder.starts_with("reddit_scrape_"));
        let SessionMetadata::Completed(meta) = metadata else {
            panic!("expected completed metadata");
        };
        assert_eq!(meta.items_scraped, 2);
        assert_eq!(meta.model, "sonnet");
        assert_eq!(meta.files, vec![SCRAPE_DATA_FILE, SCRAPE_SUMMARY_FILE]);

        let requests = runner.requests();
        assert_eq!(requests[0].args, vec!["mcp", "list", "--json"]);
        let run = &requests[1];
        assert_eq!(
            run.args,
            vec![
                "-p",
                "--max-turns",
                "15",
                "--model",
                "sonnet",
                "--allowedTools",
                "mcp__playwright",
                "--dangerously-skip-permissions"
            ]
        );
        assert_eq!(run.timeout, Some(Duration::from_secs(600)));

        let saved = dir
            .path()
            .join("claude_code_outputs")
            .join(folder)
            .join(METADATA_FILE);
        assert!(saved.is_file());
        assert!(messages(&store).contains(&"Playwright MCP already configured".to_string()));
    }

    #[tokio::test]
    async fn test_registers_playwright_when_absent() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(dir.path());
        let runner = ScriptedRunner::new()
            .then_output(exited(0, "[]", ""))
            .then_output(exited(0, "", ""))
            .then_output(exited(0, "", ""))
            .into_arc();
        let node = ScraperNode::new(ctx, runner.clone());

        let output = node.scrape(&ScrapeRequest::default()).await;
        assert_eq!(output.status, NodeStatus::degraded("No data found"));
        let requests = runner.requests();
        assert_eq!(
            requests[1].args,
            vec![
                "mcp",
                "add-json",
                "--scope",
                "user",
                "playwright",
                r#"{"command":"playwright-mcp-server"}"#
            ]
        );
    }

    #[tokio::test]
    async fn test_mcp_failure_allocates_nothing() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(dir.path());
        let runner = ScriptedRunner::new()
            .then_output(exited(1, "", "no cli"))
            .then_output(exited(1, "", "denied"))
            .into_arc();
        let node = ScraperNode::new(ctx.clone(), runner);

        let output = node.scrape(&ScrapeRequest::default()).await;
        assert_eq!(
            output.output,
            ScrapeSession::Error {
                error: "Failed to configure Playwright MCP".into()
            }
        );
        assert_eq!(output.item_count, 0);
        assert!(matches!(
            output.status,
            NodeStatus::Failed {
                kind: FailureKind::Mcp,
                ..
            }
        ));
        assert!(!ctx.config().output_root.exists());
    }

    #[tokio::test]
    async fn test_non_zero_exit_writes_error_log() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(dir.path());
        let runner = ScriptedRunner::new()
            .then_output(listed_with_playwright())
            .then(|req| {
                write_results(req, "[1]", None);
                Ok(exited(1, "", "browser crashed"))
            })
            .into_arc();
        let node = ScraperNode::new(ctx, runner);

        let output = node.scrape(&ScrapeRequest::default()).await;
        assert_eq!(output.item_count, 1);
        assert_eq!(output.summary, "Successfully scraped 1 items");
        assert_eq!(
            output.status,
            NodeStatus::degraded("Warning: Command exited with code 1")
        );
        let ScrapeSession::Session { folder, .. } = &output.output else {
            panic!("expected a session");
        };
        let log = dir
            .path()
            .join("claude_code_outputs")
            .join(folder)
            .join(ERROR_LOG_FILE);
        assert_eq!(std::fs::read_to_string(log).unwrap(), "browser crashed");
    }

    #[tokio::test]
    async fn test_timeout_salvages_partial_data() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(dir.path());
        let runner = ScriptedRunner::new()
            .then_output(listed_with_playwright())
            .then(|req| {
                write_results(req, "[1,2,3]", None);
                Err(RunnerError::TimedOut(req.timeout.unwrap()))
            })
            .into_arc();
        let node = ScraperNode::new(ctx, runner);

        let output = node.scrape(&ScrapeRequest::default()).await;
        assert_eq!(output.item_count, 3);
        assert_eq!(output.summary, "Timeout - partial data: 3 items");
        let ScrapeSession::Session {
            response, metadata, ..
        } = &output.output
        else {
            panic!("expected a session");
        };
        assert_eq!(response, "Partial data scraped before timeout: 3 items");
        assert_eq!(
            metadata,
            &SessionMetadata::Partial {
                error: timeout_message(Duration::from_secs(600)),
                partial_data: true
            }
        );
        assert!(matches!(output.status, NodeStatus::Degraded { .. }));
    }

    #[tokio::test]
    async fn test_timeout_without_data_fails() {
        let dir = TempDir::new().unwrap();
        let (ctx, _) = context(dir.path());
        let runner = ScriptedRunner::new()
            .then_output(listed_with_playwright())
            .then(|req| Err(RunnerError::TimedOut(req.timeout.unwrap())))
            .into_arc();
        let node = ScraperNode::new(ctx, runner);

        let output = node.scrape(&ScrapeRequest::default()).await;
        let message = "Scraping timeout after 10 minutes - \
            Reddit might be slow or the request is too complex";
        assert_eq!(output.summary, message);
        assert_eq!(
            output.output,
            ScrapeSession::Error {
                error: message.into()
            }
        );
        assert!(matches!(
            output.status,
            NodeStatus::Failed {
                kind: FailureKind::Timeout,
                ..
            }
        ));
    }

    #[test]
    fn test_timeout_message_units() {
        assert!(timeout_message(Duration::from_secs(60)).contains("after 1 minute -"));
        assert!(timeout_message(Duration::from_secs(45)).contains("after 45 seconds -"));
    }
}
