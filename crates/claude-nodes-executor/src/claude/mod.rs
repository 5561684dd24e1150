//! Claude Code CLI flags and MCP sub-commands.

pub mod invocation;
pub mod mcp;

pub use invocation::ClaudeInvocation;
pub use mcp::{ListFormat, McpAction, McpError, McpManager, McpOutput, McpRequest, McpServer};
