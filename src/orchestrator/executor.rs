//! Agent execution engine.
//!
//! Turns one [`InvocationRequest`] into a supervised process run:
//! build the command, run it under a per-attempt deadline, classify the
//! outcome, retry once after a fixed delay when the failure looks
//! transient, and record the terminal outcome in the [`HealthMonitor`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use super::command::{self, AgentCall, CommandSpec};
use super::health::HealthMonitor;
use super::runner::{ProcessRunner, RunOutcome, Termination};
use crate::config::{GlobalConfig, SandboxConfig};
use crate::models::invocation::{
    classify_message, ExecFailure, FailureKind, InvocationRequest, InvocationResult,
};
use crate::models::session::Workspace;

/// Deadline for the helper container that appends transcripts to a volume.
const TRANSCRIPT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Executor settings derived from [`GlobalConfig`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Agent binary for direct runs; also labels failure messages.
    pub binary: String,
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Pause before the single retry.
    pub retry_delay: Duration,
    /// Container settings used for volume-backed workspaces.
    pub sandbox: Option<SandboxConfig>,
    /// Append a chat transcript per attempt to the session workspace.
    pub verbose: bool,
}

impl ExecutorConfig {
    /// Derive executor settings from the global configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            binary: config.agent_binary.clone(),
            timeout: config.agent_timeout(),
            retry_delay: config.retry_delay(),
            sandbox: config.sandbox.enabled.then(|| config.sandbox.clone()),
            verbose: config.verbose,
        }
    }
}

/// Runs agent invocations with deadline, retry and health accounting.
pub struct Executor {
    config: ExecutorConfig,
    runner: Arc<dyn ProcessRunner>,
    monitor: Arc<HealthMonitor>,
}

impl Executor {
    /// Create an executor.
    #[must_use]
    pub fn new(
        config: ExecutorConfig,
        runner: Arc<dyn ProcessRunner>,
        monitor: Arc<HealthMonitor>,
    ) -> Self {
        Self {
            config,
            runner,
            monitor,
        }
    }

    /// Executor settings.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Process runner shared with response recovery.
    #[must_use]
    pub fn runner(&self) -> &Arc<dyn ProcessRunner> {
        &self.runner
    }

    /// Build the command for one attempt of `request`.
    ///
    /// Local workspaces run the agent binary directly; volume workspaces
    /// run it in a container.
    ///
    /// # Errors
    ///
    /// Returns a [`FailureKind::Other`] failure when the workspace is a
    /// volume but no sandbox is configured.
    pub fn build_command(&self, request: &InvocationRequest) -> Result<CommandSpec, ExecFailure> {
        let call = AgentCall {
            agent: &request.agent,
            prompt: &request.prompt,
            resume: request.resume,
            model: request.model.as_deref(),
        };

        match request.workspace {
            Workspace::LocalPath(ref dir) => {
                Ok(command::build_direct(&self.config.binary, &call, dir))
            }
            Workspace::NamedVolume(ref session_id) => {
                let sandbox = self.config.sandbox.as_ref().ok_or_else(|| {
                    ExecFailure::new(
                        FailureKind::Other,
                        "volume workspace requires the sandbox to be enabled",
                    )
                })?;
                Ok(command::build_isolated(
                    sandbox,
                    &call,
                    session_id,
                    request.task_dir.as_deref(),
                ))
            }
        }
    }

    /// Execute `request`, retrying once on a transient failure.
    ///
    /// The terminal outcome is recorded in the health monitor exactly once,
    /// with the wall time of all attempts. Cancelling `cancel` aborts the
    /// running attempt and suppresses the retry.
    pub async fn execute(
        &self,
        request: &InvocationRequest,
        cancel: &CancellationToken,
    ) -> InvocationResult {
        let span = info_span!(
            "execute_agent",
            agent = %request.agent,
            session_id = %request.workspace.session_id(),
            response_file = %request.response_file.file_name(),
        );

        async move {
            let start = Instant::now();
            let mut outcome = self.attempt(request, cancel).await;
            let mut retried = false;

            if let Err(ref failure) = outcome {
                if failure.kind.is_retryable() {
                    warn!(
                        kind = ?failure.kind,
                        error = %failure,
                        delay = ?self.config.retry_delay,
                        "transient agent failure, retrying once"
                    );
                    let waited = tokio::select! {
                        () = cancel.cancelled() => false,
                        () = tokio::time::sleep(self.config.retry_delay) => true,
                    };
                    outcome = if waited {
                        retried = true;
                        self.attempt(request, cancel).await
                    } else {
                        Err(ExecFailure::new(
                            FailureKind::Cancelled,
                            "agent invocation cancelled before retry",
                        ))
                    };
                }
            }

            let elapsed = start.elapsed();
            match outcome {
                Ok(output) => {
                    self.monitor.record_success(&request.agent, elapsed);
                    info!(?elapsed, retried, "agent invocation succeeded");
                    InvocationResult {
                        output,
                        error: None,
                        retried,
                        elapsed,
                    }
                }
                Err(failure) => {
                    self.monitor.record_failure(
                        &request.agent,
                        elapsed,
                        &failure.message,
                        failure.is_timeout(),
                    );
                    warn!(
                        ?elapsed,
                        retried,
                        kind = ?failure.kind,
                        error = %failure,
                        "agent invocation failed"
                    );
                    InvocationResult {
                        output: String::new(),
                        error: Some(failure),
                        retried,
                        elapsed,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn attempt(
        &self,
        request: &InvocationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ExecFailure> {
        let spec = self.build_command(request)?;
        let outcome = self.runner.run(&spec, self.config.timeout, cancel).await;
        let classified = classify_outcome(&self.config.binary, self.config.timeout, &outcome);

        if self.config.verbose {
            let transcript = render_transcript(request, &outcome, classified.as_ref().err());
            self.append_transcript(request, transcript).await;
        }

        classified
    }

    async fn append_transcript(&self, request: &InvocationRequest, transcript: String) {
        let file_name = request.response_file.transcript_name();

        match request.workspace {
            Workspace::LocalPath(ref dir) => {
                let path = dir.join(&file_name);
                let written = async {
                    let mut file = tokio::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)
                        .await?;
                    file.write_all(transcript.as_bytes()).await?;
                    file.flush().await
                }
                .await;
                if let Err(err) = written {
                    warn!(path = %path.display(), %err, "failed to write chat transcript");
                }
            }
            Workspace::NamedVolume(ref session_id) => {
                let Some(ref sandbox) = self.config.sandbox else {
                    return;
                };
                let spec = command::volume_append_file(sandbox, session_id, &file_name, transcript);
                let cancel = CancellationToken::new();
                match self.runner.run(&spec, TRANSCRIPT_WRITE_TIMEOUT, &cancel).await {
                    RunOutcome::Finished(output) if output.success() => {}
                    other => {
                        warn!(
                            file = %file_name,
                            outcome = ?other,
                            "failed to append chat transcript to volume"
                        );
                    }
                }
            }
        }
    }
}

/// Classify one attempt's outcome.
///
/// Success yields trimmed stdout. Failures are classified from structured
/// data first (deadline, signal, exit code with empty stderr) and only fall
/// back to inspecting the agent's stderr when that is all there is.
///
/// # Errors
///
/// Returns the classified [`ExecFailure`] for any unsuccessful outcome.
pub fn classify_outcome(
    binary: &str,
    timeout: Duration,
    outcome: &RunOutcome,
) -> Result<String, ExecFailure> {
    match outcome {
        RunOutcome::Finished(output) if output.success() => Ok(output.stdout.trim().to_owned()),
        RunOutcome::Finished(output) => {
            let stderr = output.stderr.trim();
            match output.termination {
                Termination::Signaled(signal) => {
                    let detail = if stderr.is_empty() {
                        signal.map_or_else(
                            || "terminated by signal".to_owned(),
                            |n| format!("terminated by signal {n}"),
                        )
                    } else {
                        stderr.to_owned()
                    };
                    Err(ExecFailure::new(
                        FailureKind::Killed,
                        format!("{binary} failed: {detail}"),
                    ))
                }
                Termination::Exited(code) if stderr.is_empty() => Err(ExecFailure::new(
                    FailureKind::Exit,
                    format!("{binary} failed: exit status {code}"),
                )),
                Termination::Exited(_) => Err(ExecFailure::new(
                    classify_message(stderr),
                    format!("{binary} failed: {stderr}"),
                )),
            }
        }
        RunOutcome::SpawnFailed(msg) => Err(ExecFailure::new(
            FailureKind::Spawn,
            format!("{binary} failed: {msg}"),
        )),
        RunOutcome::Failed(msg) => Err(ExecFailure::new(
            FailureKind::Other,
            format!("{binary} failed: {msg}"),
        )),
        RunOutcome::TimedOut(_) => Err(ExecFailure::new(
            FailureKind::Timeout,
            format!("agent timeout after {timeout:?}"),
        )),
        RunOutcome::Cancelled(_) => Err(ExecFailure::new(
            FailureKind::Cancelled,
            "agent invocation cancelled",
        )),
    }
}

fn render_transcript(
    request: &InvocationRequest,
    outcome: &RunOutcome,
    failure: Option<&ExecFailure>,
) -> String {
    let (stdout, stderr) = match outcome {
        RunOutcome::Finished(output) => (output.stdout.as_str(), output.stderr.as_str()),
        RunOutcome::TimedOut(partial) | RunOutcome::Cancelled(partial) => {
            (partial.stdout.as_str(), partial.stderr.as_str())
        }
        RunOutcome::SpawnFailed(_) | RunOutcome::Failed(_) => ("", ""),
    };
    let working_dir = request
        .task_dir
        .as_ref()
        .map(|dir| dir.display().to_string())
        .unwrap_or_default();

    let mut content = format!(
        "=== Chat Debug: {} ===\nAgent: {}\nWorking Directory: {working_dir}\n\
         Response File: {}\nPrompt: {}\n",
        Utc::now().to_rfc3339(),
        request.agent,
        request.response_file.file_name(),
        request.prompt,
    );
    content.push_str("\n=== STDOUT ===\n");
    content.push_str(stdout);
    content.push_str("\n=== STDERR ===\n");
    content.push_str(stderr);
    if let Some(failure) = failure {
        content.push_str(&format!("\n=== ERROR ===\n{failure}\n"));
    }
    content
}
