#![forbid(unsafe_code)]

//! `budgie`: MCP server exposing kiro-cli sub-agents as tools.
//!
//! Loads configuration and the agent catalog, then serves the tool set
//! over stdio until the client disconnects or a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use budgie::catalog::loader::load_agents;
use budgie::catalog::registry::{build_registry, FrontmatterStatus, RegisteredAgent};
use budgie::config::GlobalConfig;
use budgie::mcp::handler::AppState;
use budgie::mcp::transport;
use budgie::orchestrator::executor::{Executor, ExecutorConfig};
use budgie::orchestrator::health::HealthMonitor;
use budgie::orchestrator::runner::{ProcessRunner, TokioRunner};
use budgie::orchestrator::session_manager::{Isolation, SessionManager};
use budgie::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "budgie",
    about = "MCP server for kiro-cli sub-agents",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing agent descriptor JSON files.
    #[arg(long)]
    agents_dir: Option<PathBuf>,

    /// Base directory for local session workspaces.
    #[arg(long)]
    sessions_dir: Option<PathBuf>,

    /// Directory containing per-agent prompt files.
    #[arg(long)]
    prompts_dir: Option<PathBuf>,

    /// System prompt template appended to every agent prompt.
    #[arg(long)]
    system_prompt: Option<PathBuf>,

    /// Template used when an agent did not write its response file.
    #[arg(long)]
    context_summary_prompt: Option<PathBuf>,

    /// Agent CLI binary.
    #[arg(long)]
    kiro_binary: Option<String>,

    /// Prefix for registered tool names.
    #[arg(long)]
    tool_prefix: Option<String>,

    /// Per-attempt agent timeout in seconds.
    #[arg(long)]
    agent_timeout: Option<u64>,

    /// Run each session inside a container with its own named volume.
    #[arg(long)]
    sandbox: bool,

    /// Container image used when the sandbox is enabled.
    #[arg(long)]
    sandbox_image: Option<String>,

    /// Write chat transcripts into each session workspace.
    #[arg(long)]
    verbose: bool,

    /// Print the registered tools and exit.
    #[arg(long)]
    list_tools: bool,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("budgie server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config = match args.config {
        Some(ref path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    let config = Arc::new(apply_overrides(config, &args)?);
    info!(
        agents_dir = %config.agents_dir.display(),
        sandbox = config.sandbox.enabled,
        "configuration loaded"
    );

    // ── Discover agents ─────────────────────────────────
    let descriptors = load_agents(&config.agents_dir)?;
    if descriptors.is_empty() {
        return Err(AppError::Agent(format!(
            "no agents found in {}",
            config.agents_dir.display()
        )));
    }
    let agents = build_registry(&descriptors, &config);
    info!(
        discovered = descriptors.len(),
        registered = agents.len(),
        "agent catalog loaded"
    );

    if args.list_tools {
        print_tools(&agents, &config);
        return Ok(());
    }

    // ── Build shared application state ──────────────────
    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioRunner);
    let monitor = Arc::new(HealthMonitor::new());
    let sessions = Arc::new(SessionManager::new(
        Isolation::from_config(&config),
        Arc::clone(&runner),
    ));
    let executor = Arc::new(Executor::new(
        ExecutorConfig::from_config(&config),
        Arc::clone(&runner),
        Arc::clone(&monitor),
    ));

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        sessions: Arc::clone(&sessions),
        executor,
        monitor,
        agents,
    });

    // ── Serve until disconnect or signal ────────────────
    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    let signal_handle = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });

    info!("MCP server ready");
    if let Err(err) = transport::serve_stdio(state, ct.clone()).await {
        error!(%err, "stdio transport failed");
    }
    ct.cancel();
    signal_handle.abort();

    // ── Remove session workspaces ───────────────────────
    sessions.cleanup_all().await;
    info!("budgie shut down");

    Ok(())
}

/// Apply CLI flags on top of file configuration, then re-validate.
fn apply_overrides(mut config: GlobalConfig, args: &Cli) -> Result<GlobalConfig> {
    if let Some(ref dir) = args.agents_dir {
        config.agents_dir.clone_from(dir);
    }
    if let Some(ref dir) = args.sessions_dir {
        config.sessions_dir.clone_from(dir);
    }
    if let Some(ref dir) = args.prompts_dir {
        config.prompts_dir.clone_from(dir);
    }
    if let Some(ref path) = args.system_prompt {
        config.system_prompt_path.clone_from(path);
    }
    if let Some(ref path) = args.context_summary_prompt {
        config.context_summary_path.clone_from(path);
    }
    if let Some(ref binary) = args.kiro_binary {
        config.agent_binary.clone_from(binary);
        config.sandbox.agent_binary.clone_from(binary);
    }
    if let Some(ref prefix) = args.tool_prefix {
        config.tool_prefix.clone_from(prefix);
    }
    if let Some(secs) = args.agent_timeout {
        config.agent_timeout_seconds = secs;
    }
    if args.sandbox {
        config.sandbox.enabled = true;
    }
    if let Some(ref image) = args.sandbox_image {
        config.sandbox.image.clone_from(image);
    }
    if args.verbose {
        config.verbose = true;
    }

    config.validate()?;
    Ok(config)
}

fn print_tools(agents: &[RegisteredAgent], config: &GlobalConfig) {
    println!("Registered tools ({}):", agents.len() + 1);
    for agent in agents {
        let status = match agent.frontmatter {
            FrontmatterStatus::Loaded => "loaded".to_owned(),
            FrontmatterStatus::NotFound => "not found".to_owned(),
            FrontmatterStatus::Error(ref err) => format!("error: {err}"),
        };
        println!();
        println!("Tool: {}", agent.tool_name);
        println!("Agent: {}", agent.agent_name);
        println!("Model: {}", agent.model);
        println!("Base Description: {}", agent.base_description);
        println!("Frontmatter: {status}");
        println!("Enhanced Description:\n{}", agent.description);
    }
    println!();
    println!("Tool: {}", config.health_tool_name());
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

/// Logs go to stderr; stdout carries the MCP stdio transport.
fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
