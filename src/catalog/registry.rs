//! Selection of agents to expose as MCP tools.

use std::collections::HashSet;

use tracing::{info, warn};

use super::frontmatter;
use crate::config::GlobalConfig;
use crate::models::agent::{display_description, normalize_tool_name, AgentDescriptor};

/// Outcome of looking up an agent's prompt front-matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontmatterStatus {
    /// Front-matter found and parsed.
    Loaded,
    /// No prompt file, or a prompt file without front-matter.
    NotFound,
    /// Prompt file exists but could not be read or parsed.
    Error(String),
}

/// An agent exposed as a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredAgent {
    /// MCP tool name (prefixed, normalized).
    pub tool_name: String,
    /// Agent selector passed to the CLI.
    pub agent_name: String,
    /// Descriptor description without the `sub-agent:` marker.
    pub base_description: String,
    /// Tool description; the enhanced front-matter description when present.
    pub description: String,
    /// Model passed to `--model`.
    pub model: String,
    /// Front-matter lookup result.
    pub frontmatter: FrontmatterStatus,
}

/// Build the list of agents to register.
///
/// Skips the orchestrator agent and descriptions without the `sub-agent:`
/// marker. The first agent wins when two names normalize to the same tool.
#[must_use]
pub fn build_registry(
    descriptors: &[AgentDescriptor],
    config: &GlobalConfig,
) -> Vec<RegisteredAgent> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(config.health_tool_name());

    let mut registered = Vec::new();
    for descriptor in descriptors.iter().filter(|d| d.is_exposable()) {
        let tool_name = normalize_tool_name(&descriptor.name, &config.tool_prefix);
        if !seen.insert(tool_name.clone()) {
            warn!(
                tool = %tool_name,
                agent = %descriptor.name,
                "duplicate tool name, skipping agent"
            );
            continue;
        }

        let base_description = display_description(&descriptor.description);
        let mut description = base_description.clone();
        let mut model = config.default_model.clone();

        let status = match frontmatter::load_from_prompt(&config.prompts_dir, &descriptor.name) {
            Ok(Some(metadata)) => {
                description = metadata.enhanced_description();
                if let Some(chosen) = metadata.model() {
                    chosen.clone_into(&mut model);
                }
                info!(agent = %descriptor.name, %model, "loaded prompt front-matter");
                FrontmatterStatus::Loaded
            }
            Ok(None) => FrontmatterStatus::NotFound,
            Err(err) => {
                warn!(agent = %descriptor.name, %err, "failed to load prompt front-matter");
                FrontmatterStatus::Error(err.to_string())
            }
        };

        registered.push(RegisteredAgent {
            tool_name,
            agent_name: descriptor.name.clone(),
            base_description,
            description,
            model,
            frontmatter: status,
        });
    }

    registered
}
