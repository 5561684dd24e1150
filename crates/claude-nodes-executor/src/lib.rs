//! Claude Code CLI execution.
//!
//! Provides:
//! - Command building utilities
//! - `ClaudeInvocation` - Flags for a non-interactive CLI run
//! - `ProcessRunner` - Real process execution with stdin piping and timeouts
//! - `McpManager` - MCP server registration via the CLI

pub mod claude;
pub mod command;
pub mod process;

pub use claude::{ClaudeInvocation, McpManager};
pub use command::{CommandBuilder, CommandParts};
pub use process::ProcessRunner;
