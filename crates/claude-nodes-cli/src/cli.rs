//! Command-line definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use claude_nodes_core::{ArgumentMode, MemoryMode, Model, ToolConfig, ToolPreset, ToolToggles};
use claude_nodes_executor::claude::{ListFormat, McpAction};
use claude_nodes_session::{
    ContextMode, ReadMode, ScrapeMode, SortBy, SourceType, TimeFilter,
    context::{DEFAULT_FILE_FILTER, DEFAULT_TEMPLATE},
    execute::{DEFAULT_COMMAND, DEFAULT_MAX_TURNS},
};

#[derive(Parser, Debug)]
#[command(name = "claude-nodes")]
#[command(version, about = "Run Claude Code workflow nodes from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (defaults to ./claude-nodes.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the display string instead of JSON
    #[arg(long, global = true)]
    pub text: bool,

    /// Node id attached to progress messages
    #[arg(long, global = true, default_value = "cli")]
    pub node_id: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the available nodes
    Nodes,
    /// List command preset files
    Commands,
    /// List memory files
    Memories,
    /// Build an argument map
    Args(ArgsCmd),
    /// Build memory text
    Memory(MemoryCmd),
    /// Build a tool configuration
    Tools(ToolsCmd),
    /// Manage MCP servers
    Mcp(McpCmd),
    /// Run a command in a fresh output folder
    Execute(ExecuteCmd),
    /// Scrape Reddit through the Playwright MCP
    Scrape(ScrapeCmd),
    /// Read files from an output folder
    Read(ReadCmd),
    /// Build memory from an output folder
    Context(ContextCmd),
}

#[derive(Args, Debug)]
pub struct ArgsCmd {
    #[arg(long, default_value_t = ArgumentMode::Json)]
    pub mode: ArgumentMode,
    /// JSON object for `json` mode
    #[arg(long)]
    pub json: Option<String>,
    #[arg(long, default_value = "")]
    pub key: String,
    #[arg(long, default_value = "")]
    pub value: String,
    /// Serialized map to extend
    #[arg(long)]
    pub base: Option<String>,
    /// Serialized map overlaid in `merge` mode
    #[arg(long)]
    pub merge: Option<String>,
}

#[derive(Args, Debug)]
pub struct MemoryCmd {
    #[arg(long, default_value_t = MemoryMode::Text)]
    pub mode: MemoryMode,
    #[arg(long, default_value = "")]
    pub text: String,
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// File name inside the memories directory
    #[arg(long)]
    pub memory_file: Option<String>,
    #[arg(long, default_value = "")]
    pub claude_md: String,
    /// Earlier memory to append to
    #[arg(long)]
    pub append_to: Option<String>,
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ToolsCmd {
    #[arg(long, default_value_t = ToolPreset::CodeDev)]
    pub preset: ToolPreset,
    /// Comma-separated tools to add
    #[arg(long, default_value = "")]
    pub custom: String,
    /// Comma-separated tools to remove
    #[arg(long, default_value = "")]
    pub remove: String,
    #[arg(long)]
    pub no_file_read: bool,
    #[arg(long)]
    pub no_file_write: bool,
    #[arg(long)]
    pub no_file_edit: bool,
    #[arg(long)]
    pub no_bash: bool,
    #[arg(long)]
    pub no_search: bool,
    #[arg(long)]
    pub web: bool,
    #[arg(long)]
    pub skip_permissions: bool,
}

impl ToolsCmd {
    pub const fn toggles(&self) -> ToolToggles {
        ToolToggles {
            file_read: !self.no_file_read,
            file_write: !self.no_file_write,
            file_edit: !self.no_file_edit,
            bash: !self.no_bash,
            search: !self.no_search,
            web: self.web,
        }
    }
}

#[derive(Args, Debug)]
pub struct McpCmd {
    #[arg(long, default_value = "list")]
    pub action: McpAction,
    #[arg(long, default_value = "")]
    pub name: String,
    /// Registration JSON for `enable`
    #[arg(long, default_value = "{}")]
    pub config_json: String,
    #[arg(long, default_value = "names")]
    pub format: ListFormat,
}

#[derive(Args, Debug)]
pub struct ExecuteCmd {
    /// Literal command text
    #[arg(long, default_value = DEFAULT_COMMAND)]
    pub command: String,
    /// Preset file in the commands directory
    #[arg(long)]
    pub command_file: Option<String>,
    #[arg(long, default_value = "default")]
    pub model: Model,
    #[arg(long, default_value_t = DEFAULT_MAX_TURNS)]
    pub max_turns: u32,
    #[arg(long, default_value = "")]
    pub memory: String,
    /// JSON object used for `${KEY}` substitution
    #[arg(long, default_value = "{}")]
    pub arguments: String,
    /// Tool configuration, e.g. `Read,Write|skip_permissions:false`
    #[arg(long)]
    pub tools: Option<ToolConfig>,
    /// Earlier output folder to reference
    #[arg(long, default_value = "")]
    pub previous_output: String,
    /// Signal from the MCP manager, e.g. `enabled:slack`
    #[arg(long)]
    pub mcp_config: Option<String>,
}

#[derive(Args, Debug)]
pub struct ScrapeCmd {
    #[arg(long, default_value_t = SourceType::Subreddit)]
    pub source_type: SourceType,
    #[arg(long, default_value = "programming")]
    pub source: String,
    #[arg(long, default_value_t = ScrapeMode::Comments)]
    pub mode: ScrapeMode,
    #[arg(long, default_value_t = 10)]
    pub max_items: u32,
    #[arg(long, default_value = "sonnet")]
    pub model: Model,
    #[arg(long, default_value_t = SortBy::Hot)]
    pub sort_by: SortBy,
    #[arg(long, default_value_t = TimeFilter::Day)]
    pub time_filter: TimeFilter,
    /// Skip author, score and similar post fields
    #[arg(long)]
    pub no_metadata: bool,
    #[arg(long, default_value_t = 2)]
    pub max_comment_depth: u32,
    #[arg(long, default_value = "")]
    pub memory: String,
    #[arg(long, default_value = "")]
    pub previous_output: String,
}

#[derive(Args, Debug)]
pub struct ReadCmd {
    /// Output folder name
    pub folder: String,
    #[arg(long, default_value = "*")]
    pub pattern: String,
    #[arg(long, default_value_t = ReadMode::ListFiles)]
    pub mode: ReadMode,
    #[arg(long, default_value = "")]
    pub file: String,
    #[arg(long, default_value_t = 10)]
    pub max_files: usize,
}

#[derive(Args, Debug)]
pub struct ContextCmd {
    /// Output folder name; empty returns the base memory
    #[arg(default_value = "")]
    pub folder: String,
    #[arg(long, default_value_t = ContextMode::Summary)]
    pub mode: ContextMode,
    #[arg(long, default_value = "")]
    pub base_memory: String,
    #[arg(long, default_value = DEFAULT_FILE_FILTER)]
    pub filter: String,
    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    pub template: String,
    #[arg(long, default_value_t = 100)]
    pub max_file_size_kb: u64,
}
