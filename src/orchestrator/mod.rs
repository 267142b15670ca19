//! Agent execution orchestration.
//!
//! Covers session workspace management, command construction, process
//! supervision with retry, response recovery, and health accounting.

pub mod command;
pub mod executor;
pub mod health;
pub mod prompt;
pub mod recovery;
pub mod runner;
pub mod session_manager;
