//! Session workspace allocation and shutdown cleanup.
//!
//! Each session id maps to exactly one workspace: a directory under the
//! configured sessions directory, or a named container volume when the
//! sandbox is enabled. Workspaces are created on first reference, reused
//! for later invocations with the same id, and removed by
//! [`SessionManager::cleanup_all`] during shutdown.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use super::command::{self, CommandSpec};
use super::runner::{ProcessRunner, RunOutcome};
use crate::config::{GlobalConfig, SandboxConfig};
use crate::models::session::{is_valid_session_id, new_session_id, Workspace};
use crate::{AppError, Result};

/// Deadline for `volume create` / `volume rm` calls.
const VOLUME_OP_TIMEOUT: Duration = Duration::from_secs(60);

/// Where session workspaces live.
#[derive(Debug, Clone)]
pub enum Isolation {
    /// One host directory per session under `base_dir`.
    Local {
        /// Parent directory of all session directories.
        base_dir: PathBuf,
    },
    /// One named container volume per session.
    Container(SandboxConfig),
}

impl Isolation {
    /// Pick the isolation mode from configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        if config.sandbox.enabled {
            Self::Container(config.sandbox.clone())
        } else {
            Self::Local {
                base_dir: config.sessions_dir.clone(),
            }
        }
    }
}

/// Tracks every session workspace created by this process.
pub struct SessionManager {
    isolation: Isolation,
    runner: Arc<dyn ProcessRunner>,
    sessions: Mutex<HashSet<String>>,
}

impl SessionManager {
    /// Create a manager with no tracked sessions.
    #[must_use]
    pub fn new(isolation: Isolation, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            isolation,
            runner,
            sessions: Mutex::new(HashSet::new()),
        }
    }

    /// Isolation mode this manager allocates for.
    #[must_use]
    pub fn isolation(&self) -> &Isolation {
        &self.isolation
    }

    /// Resolve the workspace for `session_id`, creating it if needed.
    ///
    /// A missing or blank id yields a freshly generated one. Returns the
    /// workspace together with the resolved session id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` if the id is malformed or the directory
    /// cannot be created, and `AppError::Container` if the volume cannot be
    /// created.
    pub async fn acquire(&self, session_id: Option<&str>) -> Result<(Workspace, String)> {
        let id = match session_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) if is_valid_session_id(id) => id.to_owned(),
            Some(id) => {
                return Err(AppError::Session(format!("invalid session id: {id:?}")));
            }
            None => new_session_id(),
        };

        let newly_tracked = self.sessions.lock().await.insert(id.clone());

        let span = info_span!("acquire_session", session_id = %id, newly_tracked);
        let workspace = async {
            match self.isolation {
                Isolation::Local { ref base_dir } => {
                    let base = std::path::absolute(base_dir).map_err(|err| {
                        AppError::Session(format!(
                            "cannot resolve sessions dir {}: {err}",
                            base_dir.display()
                        ))
                    })?;
                    let dir = base.join(&id);
                    tokio::fs::create_dir_all(&dir).await.map_err(|err| {
                        AppError::Session(format!(
                            "failed to create workspace {}: {err}",
                            dir.display()
                        ))
                    })?;
                    Ok::<_, AppError>(Workspace::LocalPath(dir))
                }
                Isolation::Container(ref sandbox) => {
                    let spec = command::volume_create(sandbox, &id);
                    self.run_volume_op(&spec).await.map_err(|msg| {
                        AppError::Container(format!(
                            "failed to create volume {}: {msg}",
                            sandbox.volume_name(&id)
                        ))
                    })?;
                    Ok(Workspace::NamedVolume(id.clone()))
                }
            }
        }
        .instrument(span)
        .await?;

        if newly_tracked {
            info!(session_id = %id, "session workspace ready");
        }

        Ok((workspace, id))
    }

    /// Session id owning `workspace`.
    #[must_use]
    pub fn session_id_for(&self, workspace: &Workspace) -> String {
        workspace.session_id()
    }

    /// Number of sessions currently tracked.
    pub async fn tracked_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether `session_id` is currently tracked.
    pub async fn is_tracked(&self, session_id: &str) -> bool {
        self.sessions.lock().await.contains(session_id)
    }

    /// Remove every tracked workspace, best-effort.
    ///
    /// Failures are logged and skipped. Workspaces that were never created
    /// are ignored. The tracked set is empty afterwards.
    pub async fn cleanup_all(&self) {
        let ids: Vec<String> = self.sessions.lock().await.drain().collect();
        let span = info_span!("cleanup_sessions", count = ids.len());

        async {
            for id in &ids {
                match self.isolation {
                    Isolation::Local { ref base_dir } => {
                        let dir = std::path::absolute(base_dir)
                            .unwrap_or_else(|_| base_dir.clone())
                            .join(id);
                        match tokio::fs::remove_dir_all(&dir).await {
                            Ok(()) => {}
                            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                            Err(err) => {
                                warn!(
                                    session_id = %id,
                                    dir = %dir.display(),
                                    %err,
                                    "failed to remove session workspace"
                                );
                            }
                        }
                    }
                    Isolation::Container(ref sandbox) => {
                        let spec = command::volume_remove(sandbox, id);
                        if let Err(msg) = self.run_volume_op(&spec).await {
                            warn!(
                                session_id = %id,
                                volume = %sandbox.volume_name(id),
                                error = %msg,
                                "failed to remove session volume"
                            );
                        }
                    }
                }
            }
            info!("session workspaces cleaned up");
        }
        .instrument(span)
        .await;
    }

    async fn run_volume_op(&self, spec: &CommandSpec) -> std::result::Result<(), String> {
        let cancel = CancellationToken::new();
        match self.runner.run(spec, VOLUME_OP_TIMEOUT, &cancel).await {
            RunOutcome::Finished(output) if output.success() => Ok(()),
            RunOutcome::Finished(output) => Err(output.stderr.trim().to_owned()),
            RunOutcome::SpawnFailed(msg) | RunOutcome::Failed(msg) => Err(msg),
            RunOutcome::TimedOut(_) => Err(format!("timed out after {VOLUME_OP_TIMEOUT:?}")),
            RunOutcome::Cancelled(_) => Err("cancelled".into()),
        }
    }
}
