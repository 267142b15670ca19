//! Agent descriptor loader.
//!
//! Reads every `*.json` file in the agents directory into an
//! [`AgentDescriptor`]. Individual files that cannot be read or parsed are
//! skipped with a warning so one broken descriptor does not hide the rest.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::models::agent::AgentDescriptor;
use crate::{AppError, Result};

/// Load agent descriptors from `agents_dir`, ordered by file name.
///
/// Directories, non-JSON files, malformed JSON and descriptors without a
/// name are skipped.
///
/// # Errors
///
/// Returns `AppError::Agent` if the directory itself cannot be read.
pub fn load_agents(agents_dir: &Path) -> Result<Vec<AgentDescriptor>> {
    let entries = fs::read_dir(agents_dir).map_err(|err| {
        AppError::Agent(format!(
            "cannot read agents dir {}: {err}",
            agents_dir.display()
        ))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut agents = Vec::with_capacity(files.len());
    for path in files {
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read agent descriptor, skipping");
                continue;
            }
        };

        let descriptor: AgentDescriptor = match serde_json::from_str(&raw) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!(path = %path.display(), %err, "malformed agent descriptor, skipping");
                continue;
            }
        };

        if descriptor.name.is_empty() {
            warn!(path = %path.display(), "agent descriptor has no name, skipping");
            continue;
        }

        agents.push(descriptor);
    }

    Ok(agents)
}
