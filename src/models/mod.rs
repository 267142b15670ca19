//! Domain model module declarations.

pub mod agent;
pub mod health;
pub mod invocation;
pub mod metadata;
pub mod session;
