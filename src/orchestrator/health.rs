//! In-memory health accounting for agent invocations.
//!
//! A single [`HealthMonitor`] is constructed at startup and shared by the
//! executor and the health-check tool. Records are only mutated through
//! [`HealthMonitor::record_success`] and [`HealthMonitor::record_failure`].

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;

use crate::models::health::{AgentHealth, HealthReport};

/// Concurrency-safe map from agent name to its [`AgentHealth`].
#[derive(Debug, Default)]
pub struct HealthMonitor {
    metrics: RwLock<HashMap<String, AgentHealth>>,
}

impl HealthMonitor {
    /// Create an empty monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful call.
    pub fn record_success(&self, agent: &str, duration: Duration) {
        let mut metrics = self
            .metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = metrics.entry(agent.to_owned()).or_default();
        entry.total_calls += 1;
        entry.success_calls += 1;
        entry.total_duration += duration;
        entry.last_success = Some(Utc::now());
    }

    /// Record a failed call; `is_timeout` also bumps the timeout counter.
    pub fn record_failure(&self, agent: &str, duration: Duration, error: &str, is_timeout: bool) {
        let mut metrics = self
            .metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = metrics.entry(agent.to_owned()).or_default();
        entry.total_calls += 1;
        entry.failed_calls += 1;
        entry.total_duration += duration;
        entry.last_failure = Some(Utc::now());
        error.clone_into(&mut entry.last_error);
        if is_timeout {
            entry.timeout_calls += 1;
        }
    }

    /// Copy of one agent's record; an empty record for unknown agents.
    #[must_use]
    pub fn snapshot(&self, agent: &str) -> AgentHealth {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(agent)
            .cloned()
            .unwrap_or_default()
    }

    /// Copy of every agent's record.
    #[must_use]
    pub fn snapshot_all(&self) -> HashMap<String, AgentHealth> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Aggregate report for the health-check tool.
    #[must_use]
    pub fn report(&self) -> HealthReport {
        HealthReport::from_snapshots(self.snapshot_all())
    }
}
