//! Prompt composition and template loading.

use std::path::Path;

use tracing::warn;

/// Placeholder replaced with the absolute response file path.
pub const RESPONSE_FILE_PLACEHOLDER: &str = "{{RESPONSE_FILE}}";

/// Placeholder replaced with the directory the agent works on.
pub const WORKING_DIRECTORY_PLACEHOLDER: &str = "{{WORKING_DIRECTORY}}";

/// Build the prompt sent to the agent.
///
/// The caller's prompt is prefixed with the working directory. When a
/// system prompt template is available it is appended after a blank line
/// with both placeholders substituted.
#[must_use]
pub fn compose_prompt(
    prompt: &str,
    working_dir: &str,
    system_template: Option<&str>,
    response_path: &str,
) -> String {
    let mut composed = format!("In directory {working_dir}, {prompt}");

    if let Some(template) = system_template {
        let system = template
            .replace(RESPONSE_FILE_PLACEHOLDER, response_path)
            .replace(WORKING_DIRECTORY_PLACEHOLDER, working_dir);
        composed.push_str("\n\n");
        composed.push_str(&system);
    }

    composed
}

/// Build the corrective prompt asking the agent to write its response file.
#[must_use]
pub fn fallback_prompt(template: &str, response_path: &str) -> String {
    template.replace(RESPONSE_FILE_PLACEHOLDER, response_path)
}

/// Read a template file. A missing file is not an error; the feature it
/// drives is simply skipped.
pub async fn load_template(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read prompt template");
            None
        }
    }
}
