//! YAML front-matter parsing for agent prompt files.

use std::fs;
use std::path::Path;

use crate::models::metadata::AgentMetadata;
use crate::Result;

const DELIMITER: &str = "---\n";
const CLOSING_DELIMITER: &str = "\n---\n";

/// Extract the front-matter block from prompt file content.
///
/// The file must start with `---` on its own line and contain a closing
/// `---` line; otherwise there is no front-matter.
#[must_use]
pub fn split_frontmatter(content: &str) -> Option<&str> {
    let rest = content.strip_prefix(DELIMITER)?;
    rest.find(CLOSING_DELIMITER).map(|end| &rest[..end])
}

/// Parse front-matter from prompt file content.
///
/// # Errors
///
/// Returns `AppError::Frontmatter` if the block is not valid YAML.
pub fn parse(content: &str) -> Result<Option<AgentMetadata>> {
    match split_frontmatter(content) {
        Some(block) => Ok(Some(serde_yaml::from_str(block)?)),
        None => Ok(None),
    }
}

/// Load front-matter from `<prompts_dir>/<agent_name>.md`.
///
/// A missing prompt file or one without front-matter yields `Ok(None)`.
///
/// # Errors
///
/// Returns `AppError::Io` for read failures other than a missing file and
/// `AppError::Frontmatter` for invalid YAML.
pub fn load_from_prompt(prompts_dir: &Path, agent_name: &str) -> Result<Option<AgentMetadata>> {
    let path = prompts_dir.join(format!("{agent_name}.md"));
    match fs::read_to_string(&path) {
        Ok(content) => parse(&content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
