//! `claude-nodes`: run workflow nodes from the command line.
//!
//! Results go to stdout (JSON, or the display string with `--text`);
//! progress and logs go to stderr.

mod cli;

use std::{process::ExitCode, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use claude_nodes_core::{
    ArgumentMap, ArgumentsRequest, CommandRunner, McpSignal, MemoryRequest, NODES, NodeContext,
    NodeStatus, NodesConfig, ProgressStore, ToolConfig, ToolsRequest, build_arguments,
    build_memory,
    catalog::{list_command_files, list_memory_files},
    configure_tools,
};
use claude_nodes_executor::{McpManager, ProcessRunner, claude::McpRequest};
use claude_nodes_session::{
    CommandSource, ContextNode, ContextRequest, ExecuteNode, ExecuteRequest, ReadRequest,
    ReaderNode, ScrapeRequest, ScraperNode,
};
use futures::StreamExt;
use tokio::task::JoinHandle;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};

/// A node result ready for printing.
struct Rendered {
    json: serde_json::Value,
    text: String,
    failed: bool,
}

impl Rendered {
    fn new<T: Serialize>(
        output: &T,
        text: String,
        status: Option<&NodeStatus>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            json: serde_json::to_value(output).context("Failed to serialize node output")?,
            text,
            failed: status.is_some_and(NodeStatus::is_failed),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = NodesConfig::discover(cli.config.as_deref()).context("Failed to load config")?;
    tracing::debug!(?config, "Loaded configuration");

    let store = Arc::new(ProgressStore::new());
    let ctx = NodeContext::new(config, store.clone());

    let mut lines = store.update_lines();
    let printer = tokio::spawn(async move {
        while let Some(line) = lines.next().await {
            eprintln!("{line}");
        }
    });

    let result = run(&cli, ctx).await;
    finish_progress(&store, printer).await;

    let rendered = result?;
    if cli.text {
        println!("{}", rendered.text);
    } else {
        println!("{}", serde_json::to_string_pretty(&rendered.json)?);
    }
    Ok(if rendered.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Close the progress stream and wait for the printer to drain it.
async fn finish_progress(store: &ProgressStore, printer: JoinHandle<()>) {
    store.push_finished();
    if let Err(e) = printer.await {
        tracing::warn!("Progress printer stopped abnormally: {e}");
    }
}

async fn run(cli: &Cli, ctx: NodeContext) -> anyhow::Result<Rendered> {
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());
    let node_id = cli.node_id.clone();

    match &cli.command {
        Command::Nodes => {
            let text = NODES
                .iter()
                .map(|n| format!("{}\t{}\t{}", n.id, n.display_name, n.category))
                .collect::<Vec<_>>()
                .join("\n");
            Rendered::new(&NODES, text, None)
        }
        Command::Commands => {
            let files = list_command_files(&ctx.config().commands_dir);
            Rendered::new(&files, files.join("\n"), None)
        }
        Command::Memories => {
            let files = list_memory_files(&ctx.config().memories_dir);
            Rendered::new(&files, files.join("\n"), None)
        }
        Command::Args(args) => {
            let output = build_arguments(&ArgumentsRequest {
                mode: args.mode,
                json_arguments: args.json.clone(),
                key: args.key.clone(),
                value: args.value.clone(),
                base_arguments: args.base.clone(),
                merge_arguments: args.merge.clone(),
            });
            Rendered::new(&output, output.arguments_json.clone(), Some(&output.status))
        }
        Command::Memory(args) => {
            let output = build_memory(
                ctx.config(),
                &MemoryRequest {
                    mode: args.mode,
                    text: args.text.clone(),
                    file_path: args.file.clone(),
                    memory_file: args.memory_file.clone(),
                    claude_md_content: args.claude_md.clone(),
                    append_to: args.append_to.clone(),
                },
            );
            Rendered::new(&output, output.memory.clone(), Some(&output.status))
        }
        Command::Tools(args) => {
            let output = configure_tools(&ToolsRequest {
                preset: args.preset,
                custom_tools: args.custom.clone(),
                remove_tools: args.remove.clone(),
                toggles: args.toggles(),
                skip_permissions: args.skip_permissions,
            });
            Rendered::new(&output, output.tools.to_string(), None)
        }
        Command::Mcp(args) => {
            let manager = McpManager::new(runner, ctx.config().cli_program.clone());
            let output = manager
                .manage(&McpRequest {
                    action: args.action,
                    name: args.name.clone(),
                    config_json: args.config_json.clone(),
                    list_format: args.format,
                })
                .await;
            Rendered::new(&output, output.info.clone(), Some(&output.status))
        }
        Command::Execute(args) => {
            let request = ExecuteRequest {
                node_id,
                source: args
                    .command_file
                    .clone()
                    .map_or(CommandSource::Text, CommandSource::File),
                command: args.command.clone(),
                model: args.model.clone(),
                max_turns: args.max_turns,
                memory: args.memory.clone(),
                arguments: ArgumentMap::parse_lenient(&args.arguments),
                tools: args.tools.clone().unwrap_or_else(ToolConfig::execute_default),
                previous_output: args.previous_output.clone(),
                mcp_config: args
                    .mcp_config
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .map(parse_signal),
            };
            let output = ExecuteNode::new(ctx, runner).execute(&request).await;
            Rendered::new(&output, output.response.clone(), Some(&output.status))
        }
        Command::Scrape(args) => {
            let request = ScrapeRequest {
                node_id,
                source_type: args.source_type,
                source: args.source.clone(),
                scrape_mode: args.mode,
                max_items: args.max_items,
                model: args.model.clone(),
                sort_by: args.sort_by,
                time_filter: args.time_filter,
                include_metadata: !args.no_metadata,
                max_comment_depth: args.max_comment_depth,
                memory: args.memory.clone(),
                previous_output: args.previous_output.clone(),
            };
            let output = ScraperNode::new(ctx, runner).scrape(&request).await;
            Rendered::new(&output, output.summary.clone(), Some(&output.status))
        }
        Command::Read(args) => {
            let output = ReaderNode::new(&ctx).read(&ReadRequest {
                output_folder: args.folder.clone(),
                file_pattern: args.pattern.clone(),
                mode: args.mode,
                specific_file: args.file.clone(),
                max_files: args.max_files,
            });
            Rendered::new(&output, output.file_contents.clone(), Some(&output.status))
        }
        Command::Context(args) => {
            let output = ContextNode::new(&ctx).build(&ContextRequest {
                output_folder: args.folder.clone(),
                mode: args.mode,
                base_memory: args.base_memory.clone(),
                file_filter: args.filter.clone(),
                custom_template: args.template.clone(),
                max_file_size_kb: args.max_file_size_kb,
            });
            Rendered::new(&output, output.memory.clone(), Some(&output.status))
        }
    }
}

fn parse_signal(text: &str) -> McpSignal {
    match text.parse() {
        Ok(signal) => signal,
        Err(never) => match never {},
    }
}
