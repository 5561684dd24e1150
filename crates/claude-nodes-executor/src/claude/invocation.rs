//! Command-line flags for the Claude Code CLI.

use claude_nodes_core::{Model, ToolConfig};

use crate::command::{CommandBuildError, CommandBuilder, CommandParts};

/// Largest accepted turn limit.
pub const MAX_TURNS_LIMIT: u32 = 512;

/// Flags for one non-interactive run of the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeInvocation {
    max_turns: u32,
    model: Model,
    tools: ToolConfig,
}

impl ClaudeInvocation {
    /// Create an invocation. `max_turns` is clamped to `1..=512`.
    #[must_use]
    pub fn new(max_turns: u32) -> Self {
        Self {
            max_turns: max_turns.clamp(1, MAX_TURNS_LIMIT),
            model: Model::Default,
            tools: ToolConfig::default(),
        }
    }

    /// Select a model. `Model::Default` emits no flag.
    #[must_use]
    pub fn model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Set allowed tools and the permission-bypass flag.
    #[must_use]
    pub fn tools(mut self, tools: ToolConfig) -> Self {
        self.tools = tools;
        self
    }

    /// Effective turn limit.
    #[must_use]
    pub const fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Arguments in CLI order.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            "--max-turns".to_string(),
            self.max_turns.to_string(),
        ];

        if let Some(model) = self.model.flag_value() {
            args.extend(["--model".to_string(), model.to_string()]);
        }

        for tool in self.tools.tools() {
            args.extend(["--allowedTools".to_string(), tool.clone()]);
        }

        if self.tools.skip_permissions() {
            args.push("--dangerously-skip-permissions".to_string());
        }

        args
    }

    /// Full command for `program` (the configured CLI base).
    ///
    /// # Errors
    /// Returns error if `program` cannot be split.
    pub fn build(&self, program: &str) -> Result<CommandParts, CommandBuildError> {
        CommandBuilder::new(program).params(self.args()).build()
    }
}

/// `mcp list --json`.
#[must_use]
pub fn mcp_list_args() -> Vec<String> {
    ["mcp", "list", "--json"].map(String::from).to_vec()
}

/// `mcp add-json --scope user <name> <json>`.
#[must_use]
pub fn mcp_add_args(name: &str, config_json: &str) -> Vec<String> {
    ["mcp", "add-json", "--scope", "user", name, config_json]
        .map(String::from)
        .to_vec()
}

/// `mcp remove --scope user <name>`.
#[must_use]
pub fn mcp_remove_args(name: &str) -> Vec<String> {
    ["mcp", "remove", "--scope", "user", name]
        .map(String::from)
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_invocation() {
        let args = ClaudeInvocation::new(8).args();
        assert_eq!(args, vec!["-p", "--max-turns", "8"]);
    }

    #[test]
    fn test_full_invocation() {
        let tools: ToolConfig = "Read,Bash|skip_permissions:true".parse().unwrap();
        let parts = ClaudeInvocation::new(20)
            .model(Model::Opus)
            .tools(tools)
            .build("claude")
            .unwrap();

        assert_eq!(parts.program, "claude");
        assert_eq!(
            parts.args,
            vec![
                "-p",
                "--max-turns",
                "20",
                "--model",
                "opus",
                "--allowedTools",
                "Bash",
                "--allowedTools",
                "Read",
                "--dangerously-skip-permissions",
            ]
        );
    }

    #[test]
    fn test_turns_clamped() {
        assert_eq!(ClaudeInvocation::new(0).max_turns(), 1);
        assert_eq!(ClaudeInvocation::new(10_000).max_turns(), MAX_TURNS_LIMIT);
    }

    #[test]
    fn test_mcp_args() {
        assert_eq!(mcp_list_args(), vec!["mcp", "list", "--json"]);
        assert_eq!(
            mcp_add_args("playwright", "{}"),
            vec!["mcp", "add-json", "--scope", "user", "playwright", "{}"]
        );
        assert_eq!(
            mcp_remove_args("slack"),
            vec!["mcp", "remove", "--scope", "user", "slack"]
        );
    }
}
