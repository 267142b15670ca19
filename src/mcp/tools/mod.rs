//! MCP tool handlers.

pub mod health_check;
pub mod invoke_agent;
