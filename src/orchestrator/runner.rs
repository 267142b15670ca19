//! Process runner abstraction.
//!
//! The [`ProcessRunner`] trait is the seam between the orchestration logic
//! and the operating system. [`TokioRunner`] spawns real processes; tests
//! substitute scripted runners to drive the executor deterministically.

use std::future::Future;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::command::CommandSpec;

/// How a finished process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Normal exit with a status code.
    Exited(i32),
    /// Terminated by a signal (number when the platform reports one).
    Signaled(Option<i32>),
}

/// Captured output of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Exit status.
    pub termination: Termination,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl RunOutput {
    /// Whether the process exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.termination == Termination::Exited(0)
    }
}

/// Output a process produced before it was stopped early.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    /// Standard output read so far.
    pub stdout: String,
    /// Standard error read so far.
    pub stderr: String,
}

/// Result of running one [`CommandSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process ran to completion (successfully or not).
    Finished(RunOutput),
    /// The process could not be started.
    SpawnFailed(String),
    /// Waiting on the process failed after it started.
    Failed(String),
    /// The deadline elapsed; the process was killed.
    TimedOut(Captured),
    /// The caller cancelled; the process was killed.
    Cancelled(Captured),
}

/// Runs command specs under a deadline with cooperative cancellation.
pub trait ProcessRunner: Send + Sync {
    /// Run `spec`, killing the process if `deadline` elapses or `cancel`
    /// fires first.
    fn run<'a>(
        &'a self,
        spec: &'a CommandSpec,
        deadline: Duration,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = RunOutcome> + Send + 'a>>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
///
/// Children are killed when the deadline elapses or the caller cancels;
/// output read up to that point is returned with the outcome.
/// `kill_on_drop(true)` covers a runner future dropped mid-wait.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

impl ProcessRunner for TokioRunner {
    fn run<'a>(
        &'a self,
        spec: &'a CommandSpec,
        deadline: Duration,
        cancel: &'a CancellationToken,
    ) -> Pin<Box<dyn Future<Output = RunOutcome> + Send + 'a>> {
        Box::pin(run_child(spec, deadline, cancel))
    }
}

async fn run_child(
    spec: &CommandSpec,
    deadline: Duration,
    cancel: &CancellationToken,
) -> RunOutcome {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref dir) = spec.current_dir {
        cmd.current_dir(dir);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            return RunOutcome::SpawnFailed(format!("failed to start {}: {err}", spec.program));
        }
    };

    debug!(
        program = %spec.program,
        pid = child.id().unwrap_or(0),
        args = spec.args.len(),
        "process spawned"
    );

    let stdin_pipe = child.stdin.take();
    let stdin_payload = spec.stdin.as_deref();
    let mut stdout = PipeCapture::spawn(child.stdout.take());
    let mut stderr = PipeCapture::spawn(child.stderr.take());

    let io = async {
        if let (Some(mut pipe), Some(payload)) = (stdin_pipe, stdin_payload) {
            if let Err(err) = pipe.write_all(payload.as_bytes()).await {
                warn!(%err, "failed to write child stdin");
            }
            // Dropping the pipe closes stdin so the child sees EOF.
        }
        let status = child.wait().await?;
        stdout.finish().await;
        stderr.finish().await;
        Ok::<_, std::io::Error>(status)
    };

    let waited = tokio::select! {
        () = cancel.cancelled() => Waited::Cancelled,
        res = tokio::time::timeout(deadline, io) => match res {
            Err(_elapsed) => Waited::TimedOut,
            Ok(status) => Waited::Exited(status),
        },
    };

    match waited {
        Waited::Exited(Ok(status)) => RunOutcome::Finished(RunOutput {
            termination: termination_of(status),
            stdout: stdout.text(),
            stderr: stderr.text(),
        }),
        Waited::Exited(Err(err)) => {
            RunOutcome::Failed(format!("failed to wait for {}: {err}", spec.program))
        }
        Waited::TimedOut => {
            stop(&mut child, &spec.program).await;
            RunOutcome::TimedOut(Captured {
                stdout: stdout.text(),
                stderr: stderr.text(),
            })
        }
        Waited::Cancelled => {
            stop(&mut child, &spec.program).await;
            RunOutcome::Cancelled(Captured {
                stdout: stdout.text(),
                stderr: stderr.text(),
            })
        }
    }
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

async fn stop(child: &mut Child, program: &str) {
    // The child may have exited while a grandchild still holds its pipes.
    if matches!(child.try_wait(), Ok(Some(_))) {
        return;
    }
    if let Err(err) = child.kill().await {
        warn!(%program, %err, "failed to kill child process");
    }
}

/// Reads a child pipe into a shared buffer as data arrives, so output is
/// still available when the process is killed before it exits.
struct PipeCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl PipeCapture {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let task = pipe.map(|mut pipe| {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move {
                let mut chunk = [0_u8; 8192];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buf, task }
    }

    /// Wait until the pipe reaches EOF.
    async fn finish(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(%err, "pipe reader task failed");
            }
        }
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap_or_else(PoisonError::into_inner))
            .into_owned()
    }
}

impl Drop for PipeCapture {
    fn drop(&mut self) {
        if let Some(ref task) = self.task {
            task.abort();
        }
    }
}

fn termination_of(status: ExitStatus) -> Termination {
    if let Some(code) = status.code() {
        return Termination::Exited(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        Termination::Signaled(status.signal())
    }

    #[cfg(not(unix))]
    {
        Termination::Signaled(None)
    }
}
