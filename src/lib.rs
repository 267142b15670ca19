#![forbid(unsafe_code)]

//! `budgie`: exposes kiro-cli agents as MCP tools with per-session
//! workspaces, bounded retries and response-file recovery.

pub mod catalog;
pub mod config;
pub mod errors;
pub mod mcp;
pub mod models;
pub mod orchestrator;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
