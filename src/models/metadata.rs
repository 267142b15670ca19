//! Front-matter metadata attached to agent prompt files.

use serde::Deserialize;

/// YAML front-matter block at the top of `<prompts_dir>/<agent>.md`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentMetadata {
    /// Agent name as declared by the prompt author.
    pub name: String,
    /// Base description shown to the calling model.
    pub description: String,
    /// What the agent is good at.
    pub capabilities: Vec<String>,
    /// Situations where the agent should be chosen.
    pub use_when: Vec<String>,
    /// Situations where the agent should not be chosen.
    pub avoid_when: Vec<String>,
    /// Tools the agent uses.
    pub tools: Vec<String>,
    /// Model override for this agent.
    pub model: String,
    /// Free-form tags.
    pub tags: Vec<String>,
}

impl AgentMetadata {
    /// Model override, if the front-matter names one.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        let model = self.model.trim();
        (!model.is_empty()).then_some(model)
    }

    /// Tool description combining the base description with the
    /// capability, use-when and avoid-when lists.
    #[must_use]
    pub fn enhanced_description(&self) -> String {
        let mut parts = vec![self.description.clone()];

        for (heading, items) in [
            ("Capabilities:", &self.capabilities),
            ("Use when:", &self.use_when),
            ("Avoid when:", &self.avoid_when),
        ] {
            if items.is_empty() {
                continue;
            }
            parts.push(format!("\n\n{heading}"));
            parts.extend(items.iter().map(|item| format!("- {item}")));
        }

        parts.join("\n")
    }
}
