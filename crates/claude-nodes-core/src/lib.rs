//! Core building blocks for Claude Code graph nodes.
//!
//! This crate provides:
//! - `NODES` - Catalog of nodes exposed to the host graph
//! - `NodesConfig` / `NodeContext` - Explicit configuration passed to every node
//! - Typed inter-node payloads (`ArgumentMap`, `ToolConfig`, `McpSignal`, `Model`)
//! - The builder nodes: arguments, memory and tool permissions
//! - `ProgressStore` - Broadcast + history for progress messages
//! - The `CommandRunner` and `ProgressSink` traits

pub mod arguments;
pub mod catalog;
pub mod config;
pub mod memory;
pub mod payload;
pub mod progress;
pub mod tools;
pub mod traits;

pub use arguments::{ArgumentMode, ArgumentsOutput, ArgumentsRequest, build_arguments};
pub use catalog::{CUSTOM_COMMAND, NODES, NodeDescriptor};
pub use config::{NodeContext, NodesConfig};
pub use memory::{MemoryMode, MemoryOutput, MemoryRequest, build_memory};
pub use payload::{ArgumentMap, FailureKind, McpSignal, Model, NodeStatus, ToolConfig};
pub use progress::{ProgressMsg, ProgressStore};
pub use tools::{ToolPreset, ToolToggles, ToolsOutput, ToolsRequest, configure_tools};
pub use traits::{
    CommandRunner, ProcessOutput, ProcessRequest, ProgressSink, RunnerError, TracingProgress,
};
