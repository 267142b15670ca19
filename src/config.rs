//! Global configuration parsing, defaults, and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Container isolation settings.
///
/// When `enabled`, every agent invocation runs inside an ephemeral
/// container and session workspaces become named volumes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct SandboxConfig {
    /// Run agents in containers instead of directly on the host.
    pub enabled: bool,
    /// Container runtime CLI (`docker`, `podman`).
    pub runtime: String,
    /// Image that contains the agent binary.
    pub image: String,
    /// Small image used for volume reads and transcript appends.
    pub helper_image: String,
    /// Agent binary name inside the image.
    pub agent_binary: String,
    /// Prefix prepended to the session id to form the volume name.
    pub volume_prefix: String,
    /// Host directory holding the agent's authentication material.
    pub auth_dir: PathBuf,
    /// Host directory holding the agent configuration.
    pub config_dir: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let home = home_dir();
        let data_dir = dirs::data_dir().unwrap_or_else(|| home.join(".local").join("share"));
        Self {
            enabled: false,
            runtime: "docker".into(),
            image: "budgie-sandbox:latest".into(),
            helper_image: "alpine:latest".into(),
            agent_binary: "kiro-cli".into(),
            volume_prefix: "budgie-session-".into(),
            auth_dir: data_dir.join("kiro-cli"),
            config_dir: home.join(".kiro"),
        }
    }
}

impl SandboxConfig {
    /// Volume name backing the given session.
    #[must_use]
    pub fn volume_name(&self, session_id: &str) -> String {
        format!("{}{session_id}", self.volume_prefix)
    }
}

/// Global configuration parsed from an optional `budgie.toml`.
///
/// Every field has a default, so an empty file (or no file at all) yields
/// a usable configuration rooted at `~/.kiro`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct GlobalConfig {
    /// Directory containing agent descriptor JSON files.
    pub agents_dir: PathBuf,
    /// Base directory for local session workspaces.
    pub sessions_dir: PathBuf,
    /// Directory containing per-agent prompt files with front-matter.
    pub prompts_dir: PathBuf,
    /// System prompt template appended to every agent prompt.
    pub system_prompt_path: PathBuf,
    /// Template used to ask an agent to write its missing response file.
    pub context_summary_path: PathBuf,
    /// Agent CLI binary used in direct mode.
    pub agent_binary: String,
    /// Prefix for registered tool names.
    pub tool_prefix: String,
    /// Model used when an agent's front-matter does not choose one.
    pub default_model: String,
    /// Per-attempt execution deadline.
    pub agent_timeout_seconds: u64,
    /// Delay before the single retry of a transient failure.
    pub retry_delay_seconds: u64,
    /// Write per-invocation chat transcripts into the session workspace.
    pub verbose: bool,
    /// Container isolation settings.
    pub sandbox: SandboxConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        let kiro_home = home_dir().join(".kiro");
        let sub_agents = kiro_home.join("sub-agents");
        let prompts_dir = sub_agents.join("prompts");
        Self {
            agents_dir: kiro_home.join("agents"),
            sessions_dir: sub_agents.join("sessions"),
            system_prompt_path: prompts_dir.join("_system.md"),
            context_summary_path: prompts_dir.join("_context-summary.md"),
            prompts_dir,
            agent_binary: "kiro-cli".into(),
            tool_prefix: "kiro-subagents.".into(),
            default_model: "claude-sonnet-4.5".into(),
            agent_timeout_seconds: 600,
            retry_delay_seconds: 2,
            verbose: false,
            sandbox: SandboxConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Per-attempt agent execution deadline.
    #[must_use]
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_seconds)
    }

    /// Delay before retrying a transient failure.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    /// Name of the aggregate health tool.
    #[must_use]
    pub fn health_tool_name(&self) -> String {
        format!("{}health-check", self.tool_prefix)
    }

    /// Check invariants that serde defaults cannot express.
    ///
    /// Called again after CLI overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.agent_timeout_seconds == 0 {
            return Err(AppError::Config(
                "agent_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.agent_binary.trim().is_empty() {
            return Err(AppError::Config("agent_binary must not be empty".into()));
        }

        if self.tool_prefix.is_empty() {
            return Err(AppError::Config("tool_prefix must not be empty".into()));
        }

        if self.sandbox.enabled {
            if self.sandbox.image.trim().is_empty() {
                return Err(AppError::Config(
                    "sandbox.image must not be empty when the sandbox is enabled".into(),
                ));
            }
            if self.sandbox.runtime.trim().is_empty() {
                return Err(AppError::Config(
                    "sandbox.runtime must not be empty when the sandbox is enabled".into(),
                ));
            }
        }

        Ok(())
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}
