//! Session workspace model.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Storage backing a session.
///
/// A session owns exactly one workspace for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Workspace {
    /// Directory on the host, named after the session id.
    LocalPath(PathBuf),
    /// Container volume; holds the session id, not the volume name.
    NamedVolume(String),
}

impl Workspace {
    /// Session id this workspace belongs to.
    ///
    /// Volumes carry the id directly; local directories are named after it.
    #[must_use]
    pub fn session_id(&self) -> String {
        match self {
            Self::LocalPath(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Self::NamedVolume(id) => id.clone(),
        }
    }

    /// Host directory, when the workspace is local.
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::LocalPath(path) => Some(path),
            Self::NamedVolume(_) => None,
        }
    }

    /// Whether invocations in this workspace run inside a container.
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        matches!(self, Self::NamedVolume(_))
    }
}

/// Generate a fresh session id.
#[must_use]
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Check that a caller-supplied session id is safe to use as a directory
/// or volume name.
///
/// Accepts ASCII alphanumerics plus `-`, `_` and `.`; rejects `.` and `..`.
#[must_use]
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
