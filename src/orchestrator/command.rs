//! Agent and container command construction.
//!
//! Everything here is pure: functions return a [`CommandSpec`] describing
//! the argument vector, and the [`runner`](super::runner) turns it into a
//! process. This keeps both execution variants testable without starting
//! processes or containers.

use std::path::{Path, PathBuf};

use crate::config::SandboxConfig;

/// Agent data directory inside the container; the session volume is
/// mounted here.
pub const CONTAINER_DATA_DIR: &str = "/root/.local/share/kiro-cli";

/// Mount point of the host authentication directory.
pub const CONTAINER_AUTH_DIR: &str = "/auth";

/// Mount point of the host agent configuration directory.
pub const CONTAINER_CONFIG_DIR: &str = "/root/.kiro";

/// Mount point of the task working directory.
pub const CONTAINER_WORKSPACE_DIR: &str = "/workspace";

/// Mount point of the session volume in helper containers.
const HELPER_MOUNT_DIR: &str = "/data";

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments, excluding the program.
    pub args: Vec<String>,
    /// Working directory for the child.
    pub current_dir: Option<PathBuf>,
    /// Content written to the child's stdin before it is closed.
    pub stdin: Option<String>,
}

impl CommandSpec {
    /// Spec for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            stdin: None,
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program and arguments joined by spaces, for logs and assertions.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether any argument equals `needle`.
    #[must_use]
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|arg| arg == needle)
    }
}

/// Logical agent invocation shared by both command variants.
#[derive(Debug, Clone, Copy)]
pub struct AgentCall<'a> {
    /// Agent selector.
    pub agent: &'a str,
    /// Prompt, passed as the final positional argument.
    pub prompt: &'a str,
    /// Add `--resume` to continue the session conversation.
    pub resume: bool,
    /// Model override; blank values are ignored.
    pub model: Option<&'a str>,
}

/// `chat --agent <name> --no-interactive [--model <m>] [--resume] <prompt>`.
#[must_use]
pub fn agent_args(call: &AgentCall<'_>) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "chat".into(),
        "--agent".into(),
        call.agent.into(),
        "--no-interactive".into(),
    ];

    if let Some(model) = call.model.filter(|m| !m.trim().is_empty()) {
        args.push("--model".into());
        args.push(model.into());
    }

    if call.resume {
        args.push("--resume".into());
    }

    args.push(call.prompt.into());
    args
}

/// Run the agent binary directly on the host inside the session directory.
#[must_use]
pub fn build_direct(binary: &str, call: &AgentCall<'_>, workspace_dir: &Path) -> CommandSpec {
    let mut spec = CommandSpec::new(binary).args(agent_args(call));
    spec.current_dir = Some(workspace_dir.to_path_buf());
    spec
}

/// Run the agent in an ephemeral container.
///
/// Mounts the session volume read-write on the agent data directory, the
/// auth and config directories read-only, and the task directory (if any)
/// read-write on [`CONTAINER_WORKSPACE_DIR`].
#[must_use]
pub fn build_isolated(
    sandbox: &SandboxConfig,
    call: &AgentCall<'_>,
    session_id: &str,
    task_dir: Option<&Path>,
) -> CommandSpec {
    let mut args = vec![
        "run".to_owned(),
        "--rm".to_owned(),
        "-v".to_owned(),
        format!("{}:{CONTAINER_DATA_DIR}:rw", sandbox.volume_name(session_id)),
        "-v".to_owned(),
        format!("{}:{CONTAINER_AUTH_DIR}:ro", sandbox.auth_dir.display()),
        "-v".to_owned(),
        format!("{}:{CONTAINER_CONFIG_DIR}:ro", sandbox.config_dir.display()),
    ];

    if let Some(dir) = task_dir {
        args.push("-v".into());
        args.push(format!("{}:{CONTAINER_WORKSPACE_DIR}:rw", dir.display()));
    }

    args.push(sandbox.image.clone());
    args.push(sandbox.agent_binary.clone());
    args.extend(agent_args(call));

    CommandSpec::new(&sandbox.runtime).args(args)
}

/// `<runtime> volume create <volume>`.
#[must_use]
pub fn volume_create(sandbox: &SandboxConfig, session_id: &str) -> CommandSpec {
    CommandSpec::new(&sandbox.runtime).args([
        "volume".to_owned(),
        "create".to_owned(),
        sandbox.volume_name(session_id),
    ])
}

/// `<runtime> volume rm <volume>`.
#[must_use]
pub fn volume_remove(sandbox: &SandboxConfig, session_id: &str) -> CommandSpec {
    CommandSpec::new(&sandbox.runtime).args([
        "volume".to_owned(),
        "rm".to_owned(),
        sandbox.volume_name(session_id),
    ])
}

/// Print a file from the session volume via a read-only helper container.
#[must_use]
pub fn volume_read_file(sandbox: &SandboxConfig, session_id: &str, file_name: &str) -> CommandSpec {
    CommandSpec::new(&sandbox.runtime).args([
        "run".to_owned(),
        "--rm".to_owned(),
        "-v".to_owned(),
        format!("{}:{HELPER_MOUNT_DIR}:ro", sandbox.volume_name(session_id)),
        sandbox.helper_image.clone(),
        "cat".to_owned(),
        format!("{HELPER_MOUNT_DIR}/{file_name}"),
    ])
}

/// Append stdin `content` to a file in the session volume.
#[must_use]
pub fn volume_append_file(
    sandbox: &SandboxConfig,
    session_id: &str,
    file_name: &str,
    content: String,
) -> CommandSpec {
    let mut spec = CommandSpec::new(&sandbox.runtime).args([
        "run".to_owned(),
        "--rm".to_owned(),
        "-i".to_owned(),
        "-v".to_owned(),
        format!("{}:{HELPER_MOUNT_DIR}:rw", sandbox.volume_name(session_id)),
        sandbox.helper_image.clone(),
        "sh".to_owned(),
        "-c".to_owned(),
        format!("cat >> {HELPER_MOUNT_DIR}/{file_name}"),
    ]);
    spec.stdin = Some(content);
    spec
}
