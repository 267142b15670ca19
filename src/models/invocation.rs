//! Invocation request/result types and failure classification.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;

use crate::models::session::Workspace;

/// Name of the file an agent is asked to write its final answer into.
///
/// Always `response-<id>.txt`, where `<id>` is 8 hex characters. The same id
/// names the verbose chat transcript (`chat-<id>.txt`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFile {
    id: String,
}

impl ResponseFile {
    /// Generate a response file name with a fresh random suffix.
    #[must_use]
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self {
            id: simple[..8].to_owned(),
        }
    }

    /// Build from a known id.
    #[must_use]
    pub fn from_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Random suffix shared by the response and transcript files.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// File name of the response artifact.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("response-{}.txt", self.id)
    }

    /// File name of the verbose chat transcript.
    #[must_use]
    pub fn transcript_name(&self) -> String {
        format!("chat-{}.txt", self.id)
    }
}

/// One logical "run this agent with this prompt" request.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// Agent selector.
    pub agent: String,
    /// Fully composed prompt text.
    pub prompt: String,
    /// Session workspace the agent runs in.
    pub workspace: Workspace,
    /// Pass `--resume` so the agent continues the session conversation.
    pub resume: bool,
    /// Model override; `None` lets the agent CLI choose.
    pub model: Option<String>,
    /// Directory the agent should work on, distinct from the workspace.
    pub task_dir: Option<PathBuf>,
    /// Response artifact the agent is asked to produce.
    pub response_file: ResponseFile,
}

/// Closed classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The attempt exceeded its deadline.
    Timeout,
    /// The process was terminated by a signal.
    Killed,
    /// Non-zero exit without a recognizable validation complaint.
    ///
    /// Retried, although this also covers legitimate rejections by the agent.
    Exit,
    /// Non-zero exit reporting that something was `required`.
    NonRetryableExit,
    /// The process could not be started.
    Spawn,
    /// The caller cancelled the request.
    Cancelled,
    /// Any other failure.
    Other,
}

impl FailureKind {
    /// Whether the engine may retry an attempt that failed this way.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Killed | Self::Exit)
    }
}

/// Classify a failure from its message alone.
///
/// Used only when the runner has nothing more structured to offer, e.g.
/// when the agent reported its own failure on stderr.
#[must_use]
pub fn classify_message(message: &str) -> FailureKind {
    if mentions_timeout(message) {
        FailureKind::Timeout
    } else if message.contains("signal") || message.contains("killed") {
        FailureKind::Killed
    } else if message.contains("exit status") && !message.contains("required") {
        FailureKind::Exit
    } else if message.contains("required") {
        FailureKind::NonRetryableExit
    } else {
        FailureKind::Other
    }
}

fn mentions_timeout(message: &str) -> bool {
    message.contains("timeout") || message.contains("deadline exceeded")
}

/// A classified execution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecFailure {
    /// Classification driving the retry decision.
    pub kind: FailureKind,
    /// Human-readable message surfaced to the caller.
    pub message: String,
}

impl ExecFailure {
    /// Construct a failure.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether health accounting should count this as a timeout.
    ///
    /// True for deadline failures and for any failure whose message
    /// mentions a timeout, whatever its retry classification.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout || mentions_timeout(&self.message)
    }
}

impl Display for ExecFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ExecFailure {}

/// Terminal outcome of one logical invocation.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    /// Trimmed stdout of the successful attempt; empty on failure.
    pub output: String,
    /// Failure of the final attempt, if any.
    pub error: Option<ExecFailure>,
    /// Whether a second attempt was made.
    pub retried: bool,
    /// Wall time across all attempts, including the retry delay.
    pub elapsed: Duration,
}

impl InvocationResult {
    /// Whether the final attempt succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
