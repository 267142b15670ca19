//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all setup and plumbing failures.
///
/// Agent execution failures are not represented here; they are captured as
/// [`ExecFailure`](crate::models::invocation::ExecFailure) values inside an
/// invocation result so the tool handler can report them in-band.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Agent descriptor directory could not be loaded.
    Agent(String),
    /// Prompt front-matter could not be parsed.
    Frontmatter(String),
    /// Session workspace could not be resolved or created.
    Session(String),
    /// Container runtime command failed.
    Container(String),
    /// MCP protocol or transport failure.
    Mcp(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Agent(msg) => write!(f, "agent: {msg}"),
            Self::Frontmatter(msg) => write!(f, "frontmatter: {msg}"),
            Self::Session(msg) => write!(f, "session: {msg}"),
            Self::Container(msg) => write!(f, "container: {msg}"),
            Self::Mcp(msg) => write!(f, "mcp: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Frontmatter(format!("invalid yaml: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
