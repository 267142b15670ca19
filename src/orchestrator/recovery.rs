//! Response artifact recovery.
//!
//! Agents are asked to write their final answer into a response file. After
//! execution the file is read back; if it is missing after a successful run,
//! one corrective invocation asks the agent to write it, and the read is
//! repeated once.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::command::{self, CONTAINER_DATA_DIR};
use super::executor::Executor;
use super::prompt::fallback_prompt;
use super::runner::RunOutcome;
use crate::models::invocation::{InvocationRequest, InvocationResult, ResponseFile};
use crate::models::session::Workspace;

/// Deadline for the helper container that reads a volume file.
const ARTIFACT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the final text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Response file written during the original invocation.
    Artifact,
    /// Response file written during the corrective invocation.
    CorrectedArtifact,
    /// Captured stdout of the original invocation.
    RawOutput,
    /// The original invocation failed and left no response file.
    Error,
}

/// Final caller-facing text of one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Text returned to the caller.
    pub text: String,
    /// Origin of `text`.
    pub source: ResponseSource,
}

/// Path of the response file as seen by the agent.
///
/// Inside the container the session volume is mounted on the agent data
/// directory; locally the file sits in the session directory.
#[must_use]
pub fn artifact_path(workspace: &Workspace, response_file: &ResponseFile) -> String {
    match workspace {
        Workspace::LocalPath(dir) => dir.join(response_file.file_name()).display().to_string(),
        Workspace::NamedVolume(_) => format!("{CONTAINER_DATA_DIR}/{}", response_file.file_name()),
    }
}

/// Reads response files and runs the corrective round.
pub struct ResponseRecovery<'a> {
    executor: &'a Executor,
}

impl<'a> ResponseRecovery<'a> {
    /// Recovery bound to the executor used for the corrective invocation.
    #[must_use]
    pub fn new(executor: &'a Executor) -> Self {
        Self { executor }
    }

    /// Read the response file, `None` when it cannot be read.
    ///
    /// Volume reads go through a read-only helper container; empty output
    /// counts as missing there.
    pub async fn read_artifact(
        &self,
        workspace: &Workspace,
        response_file: &ResponseFile,
    ) -> Option<String> {
        match workspace {
            Workspace::LocalPath(dir) => {
                tokio::fs::read_to_string(dir.join(response_file.file_name()))
                    .await
                    .ok()
                    .map(|content| content.trim().to_owned())
            }
            Workspace::NamedVolume(session_id) => {
                let sandbox = self.executor.config().sandbox.as_ref()?;
                let spec =
                    command::volume_read_file(sandbox, session_id, &response_file.file_name());
                let cancel = CancellationToken::new();
                match self
                    .executor
                    .runner()
                    .run(&spec, ARTIFACT_READ_TIMEOUT, &cancel)
                    .await
                {
                    RunOutcome::Finished(output) if output.success() => {
                        let content = output.stdout.trim();
                        (!content.is_empty()).then(|| content.to_owned())
                    }
                    _ => None,
                }
            }
        }
    }

    /// Produce the final text for `request` given its first result.
    ///
    /// Order of preference: response file, corrective-round response file,
    /// raw output, then `ERROR: <failure>` when the first run failed. The
    /// corrective round runs at most once, only after a successful first
    /// run, and only when `fallback_template` is available.
    pub async fn reconcile(
        &self,
        request: &InvocationRequest,
        first: &InvocationResult,
        fallback_template: Option<&str>,
        cancel: &CancellationToken,
    ) -> Reconciled {
        if let Some(text) = self
            .read_artifact(&request.workspace, &request.response_file)
            .await
        {
            return Reconciled {
                text,
                source: ResponseSource::Artifact,
            };
        }

        if let Some(ref failure) = first.error {
            return Reconciled {
                text: format!("ERROR: {failure}"),
                source: ResponseSource::Error,
            };
        }

        if let Some(template) = fallback_template {
            let path = artifact_path(&request.workspace, &request.response_file);
            info!(
                agent = %request.agent,
                response_file = %path,
                "response file missing, requesting it from the agent"
            );

            let corrective = InvocationRequest {
                prompt: fallback_prompt(template, &path),
                resume: true,
                ..request.clone()
            };
            let result = self.executor.execute(&corrective, cancel).await;

            if result.is_success() {
                if let Some(text) = self
                    .read_artifact(&request.workspace, &request.response_file)
                    .await
                {
                    return Reconciled {
                        text,
                        source: ResponseSource::CorrectedArtifact,
                    };
                }
                warn!(
                    agent = %request.agent,
                    "response file still missing after corrective invocation"
                );
            }
        }

        Reconciled {
            text: first.output.clone(),
            source: ResponseSource::RawOutput,
        }
    }
}
