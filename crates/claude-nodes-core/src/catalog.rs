//! Node catalog and preset file discovery.

use std::path::Path;

use serde::Serialize;

/// Sentinel entry meaning "use the literal command text".
pub const CUSTOM_COMMAND: &str = "[Custom Command]";

/// Description of a node exposed to the host graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeDescriptor {
    /// Stable identifier used by the host.
    pub id: &'static str,
    /// Human-readable name.
    pub display_name: &'static str,
    /// Menu category.
    pub category: &'static str,
    pub description: &'static str,
}

/// Every node provided by this package.
pub const NODES: &[NodeDescriptor] = &[
    NodeDescriptor {
        id: "ClaudeCodeExecute",
        display_name: "Claude Code Execute",
        category: "claude_code",
        description: "Execute Claude Code with modular configuration and progress reporting",
    },
    NodeDescriptor {
        id: "ClaudeCodeMemory",
        display_name: "Claude Memory Builder",
        category: "claude_code/helpers",
        description: "Build memory/context for Claude Code commands from various sources",
    },
    NodeDescriptor {
        id: "ClaudeCodeArguments",
        display_name: "Claude Arguments Builder",
        category: "claude_code/helpers",
        description: "Build arguments for variable substitution in Claude Code commands",
    },
    NodeDescriptor {
        id: "ClaudeCodeTools",
        display_name: "Claude Tools Config",
        category: "claude_code/helpers",
        description: "Configure which tools Claude Code can use",
    },
    NodeDescriptor {
        id: "ClaudeCodeMCP",
        display_name: "Claude MCP Manager",
        category: "claude_code/helpers",
        description: "Configure MCP servers for Claude Code",
    },
    NodeDescriptor {
        id: "ClaudeCodeReader",
        display_name: "Claude Output Reader",
        category: "claude_code",
        description: "Read and inspect contents from Claude Code output folders",
    },
    NodeDescriptor {
        id: "ClaudeCodeContext",
        display_name: "Claude Context Builder",
        category: "claude_code",
        description: "Convert Claude Code output folders into context/memory \
                      for subsequent commands",
    },
    NodeDescriptor {
        id: "ClaudeRedditScraper",
        display_name: "Claude Reddit Scraper",
        category: "claude_code/scrapers",
        description: "Scrape Reddit posts and comments using Playwright MCP",
    },
];

/// Look up a node by id.
#[must_use]
pub fn find_node(id: &str) -> Option<&'static NodeDescriptor> {
    NODES.iter().find(|node| node.id == id)
}

/// Selectable command presets: the custom sentinel, then sorted `.md`/`.txt` files.
#[must_use]
pub fn list_command_files(commands_dir: &Path) -> Vec<String> {
    let mut files = vec![CUSTOM_COMMAND.to_string()];
    files.extend(list_text_files(commands_dir));
    files
}

/// Selectable memory files: sorted `.md`/`.txt` files.
#[must_use]
pub fn list_memory_files(memories_dir: &Path) -> Vec<String> {
    list_text_files(memories_dir)
}

fn list_text_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|ext| ext == "md" || ext == "txt")
        })
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_ids_unique() {
        for node in NODES {
            assert_eq!(NODES.iter().filter(|n| n.id == node.id).count(), 1);
        }
        assert_eq!(find_node("ClaudeCodeMCP").unwrap().display_name, "Claude MCP Manager");
        assert!(find_node("Missing").is_none());
    }

    #[test]
    fn test_command_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("review.md"), "r").unwrap();
        std::fs::write(dir.path().join("audit.txt"), "a").unwrap();
        std::fs::write(dir.path().join("image.png"), "p").unwrap();
        std::fs::create_dir(dir.path().join("nested.md")).unwrap();

        assert_eq!(
            list_command_files(dir.path()),
            vec![CUSTOM_COMMAND, "audit.txt", "review.md"]
        );
        assert_eq!(list_memory_files(dir.path()), vec!["audit.txt", "review.md"]);
    }

    #[test]
    fn test_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("commands");
        assert_eq!(list_command_files(&missing), vec![CUSTOM_COMMAND]);
        assert!(list_memory_files(&missing).is_empty());
    }
}
