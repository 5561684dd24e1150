//! Tool permission builder node.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::payload::ToolConfig;

/// Named, fixed tool sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPreset {
    All,
    ReadOnly,
    FileOps,
    #[default]
    CodeDev,
    Web,
    Minimal,
    /// Empty preset; the capability toggles decide the set.
    None,
}

impl ToolPreset {
    /// Every preset, in display order.
    pub const ALL: [Self; 7] = [
        Self::All,
        Self::ReadOnly,
        Self::FileOps,
        Self::CodeDev,
        Self::Web,
        Self::Minimal,
        Self::None,
    ];

    /// Tools granted by this preset.
    #[must_use]
    pub const fn tools(self) -> &'static [&'static str] {
        match self {
            Self::All => &[
                "Read", "Write", "Edit", "MultiEdit", "Bash", "Grep", "Glob", "LS", "WebFetch",
                "WebSearch",
            ],
            Self::ReadOnly => &["Read", "Grep", "Glob", "LS"],
            Self::FileOps => &["Read", "Write", "Edit", "MultiEdit", "Grep", "Glob", "LS"],
            Self::CodeDev => &["Read", "Write", "Edit", "MultiEdit", "Bash", "Grep", "Glob", "LS"],
            Self::Web => &["WebFetch", "WebSearch"],
            Self::Minimal => &["Read", "Write"],
            Self::None => &[],
        }
    }
}

impl fmt::Display for ToolPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::ReadOnly => "read_only",
            Self::FileOps => "file_ops",
            Self::CodeDev => "code_dev",
            Self::Web => "web",
            Self::Minimal => "minimal",
            Self::None => "none",
        })
    }
}

impl FromStr for ToolPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.to_string() == s)
            .ok_or_else(|| format!("unknown tool preset: {s}"))
    }
}

/// Capability toggles, consulted only for `ToolPreset::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ToolToggles {
    pub file_read: bool,
    pub file_write: bool,
    pub file_edit: bool,
    pub bash: bool,
    pub search: bool,
    pub web: bool,
}

impl Default for ToolToggles {
    fn default() -> Self {
        Self {
            file_read: true,
            file_write: true,
            file_edit: true,
            bash: true,
            search: true,
            web: false,
        }
    }
}

impl ToolToggles {
    fn tools(self) -> Vec<&'static str> {
        let mut tools = Vec::new();
        if self.file_read {
            tools.extend(["Read", "LS"]);
        }
        if self.file_write {
            tools.push("Write");
        }
        if self.file_edit {
            tools.extend(["Edit", "MultiEdit"]);
        }
        if self.bash {
            tools.push("Bash");
        }
        if self.search {
            tools.extend(["Grep", "Glob"]);
        }
        if self.web {
            tools.extend(["WebFetch", "WebSearch"]);
        }
        tools
    }
}

/// Inputs of the tool permission builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsRequest {
    pub preset: ToolPreset,
    /// Comma-separated tools to add.
    pub custom_tools: String,
    /// Comma-separated tools to remove.
    pub remove_tools: String,
    /// Ignored unless `preset` is `none`.
    pub toggles: ToolToggles,
    pub skip_permissions: bool,
}

/// Outputs of the tool permission builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsOutput {
    /// Typed configuration for the execute node.
    pub tools: ToolConfig,
    /// Comma-joined sorted tool names.
    pub tools_list: String,
    pub skip_permissions: bool,
}

/// Compute `(preset_or_toggles ∪ custom) \ remove`, sorted.
#[must_use]
pub fn configure_tools(request: &ToolsRequest) -> ToolsOutput {
    let mut set: BTreeSet<String> = if request.preset == ToolPreset::None {
        request.toggles.tools().into_iter().map(str::to_string).collect()
    } else {
        request.preset.tools().iter().map(|t| (*t).to_string()).collect()
    };

    set.extend(split_list(&request.custom_tools));
    for tool in split_list(&request.remove_tools) {
        set.remove(&tool);
    }

    let tools = ToolConfig::new(set, request.skip_permissions);
    tracing::debug!(preset = %request.preset, tools = %tools, "Configured tools");
    ToolsOutput {
        tools_list: tools.tool_list(),
        skip_permissions: tools.skip_permissions(),
        tools,
    }
}

fn split_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(preset: ToolPreset) -> ToolsRequest {
        ToolsRequest {
            preset,
            ..ToolsRequest::default()
        }
    }

    #[test]
    fn test_preset_sorted() {
        let output = configure_tools(&request(ToolPreset::ReadOnly));
        assert_eq!(output.tools_list, "Glob,Grep,LS,Read");
        assert_eq!(output.tools.to_string(), "Glob,Grep,LS,Read|skip_permissions:false");
    }

    #[test]
    fn test_custom_and_remove() {
        let output = configure_tools(&ToolsRequest {
            custom_tools: "mcp__playwright, WebFetch".into(),
            remove_tools: "Bash,LS,NotThere".into(),
            skip_permissions: true,
            ..request(ToolPreset::CodeDev)
        });
        assert_eq!(
            output.tools_list,
            "Edit,Glob,Grep,MultiEdit,Read,WebFetch,Write,mcp__playwright"
        );
        assert!(output.skip_permissions);
        assert!(output.tools.to_string().ends_with("|skip_permissions:true"));
    }

    #[test]
    fn test_remove_wins_over_custom() {
        let output = configure_tools(&ToolsRequest {
            custom_tools: "Bash".into(),
            remove_tools: "Bash".into(),
            ..request(ToolPreset::Minimal)
        });
        assert_eq!(output.tools_list, "Read,Write");
    }

    #[test]
    fn test_toggles_only_for_none() {
        let toggles = ToolToggles {
            file_read: false,
            file_write: false,
            file_edit: false,
            bash: false,
            search: false,
            web: true,
        };

        let ignored = configure_tools(&ToolsRequest {
            toggles,
            ..request(ToolPreset::Minimal)
        });
        assert_eq!(ignored.tools_list, "Read,Write");

        let applied = configure_tools(&ToolsRequest {
            toggles,
            ..request(ToolPreset::None)
        });
        assert_eq!(applied.tools_list, "WebFetch,WebSearch");
    }

    #[test]
    fn test_default_toggles() {
        let output = configure_tools(&request(ToolPreset::None));
        assert_eq!(output.tools_list, "Bash,Edit,Glob,Grep,LS,MultiEdit,Read,Write");
    }

    #[test]
    fn test_every_preset_matches_set_law() {
        for preset in ToolPreset::ALL {
            let output = configure_tools(&ToolsRequest {
                custom_tools: "Zeta,Read".into(),
                remove_tools: "Write".into(),
                ..request(preset)
            });

            let base: Vec<&str> = if preset == ToolPreset::None {
                ToolToggles::default().tools()
            } else {
                preset.tools().to_vec()
            };
            let mut expected: BTreeSet<String> = base.into_iter().map(str::to_string).collect();
            expected.extend(["Zeta".to_string(), "Read".to_string()]);
            expected.remove("Write");

            assert_eq!(output.tools.tools(), &expected, "preset {preset}");
        }
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!("read_only".parse::<ToolPreset>().unwrap(), ToolPreset::ReadOnly);
        assert!("everything".parse::<ToolPreset>().is_err());
    }
}
