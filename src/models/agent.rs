//! Agent descriptor model and tool-naming conventions.

use serde::Deserialize;

/// Case-insensitive description prefix marking an agent as exposable.
pub const SUB_AGENT_PREFIX: &str = "sub-agent:";

/// Agent name that is never exposed as a tool, so the orchestrating agent
/// cannot invoke itself through this server.
pub const ORCHESTRATOR_AGENT: &str = "orchestrator";

/// Agent descriptor loaded from `<agents_dir>/<name>.json`.
///
/// Only `name` and `description` are read; any other keys in the file are
/// ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AgentDescriptor {
    /// Agent selector passed to `--agent`.
    #[serde(default)]
    pub name: String,
    /// Free-form description; `sub-agent:` prefixed descriptions are exposed.
    #[serde(default)]
    pub description: String,
}

impl AgentDescriptor {
    /// Whether this agent should be registered as a tool.
    #[must_use]
    pub fn is_exposable(&self) -> bool {
        self.name != ORCHESTRATOR_AGENT && is_sub_agent(&self.description)
    }
}

/// Whether the description carries the `sub-agent:` marker.
#[must_use]
pub fn is_sub_agent(description: &str) -> bool {
    description
        .get(..SUB_AGENT_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(SUB_AGENT_PREFIX))
}

/// Strip the `sub-agent:` marker for display. Other descriptions are
/// returned unchanged.
#[must_use]
pub fn display_description(description: &str) -> String {
    if is_sub_agent(description) {
        description[SUB_AGENT_PREFIX.len()..].trim().to_owned()
    } else {
        description.to_owned()
    }
}

/// Build a tool name from an agent name: lowercase, with every character
/// outside `[a-z0-9_.-]` replaced by `-`, then prefixed.
#[must_use]
pub fn normalize_tool_name(agent_name: &str, tool_prefix: &str) -> String {
    let normalized: String = agent_name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{tool_prefix}{normalized}")
}
