//! Per-agent health record and the aggregate report served by the
//! health-check tool.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Call outcome counters for one agent.
///
/// Lives for the process lifetime; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentHealth {
    /// All recorded calls.
    pub total_calls: u64,
    /// Calls that ended successfully.
    pub success_calls: u64,
    /// Calls that ended in failure (timeouts included).
    pub failed_calls: u64,
    /// Failed calls that were timeouts.
    pub timeout_calls: u64,
    /// Sum of call durations.
    pub total_duration: Duration,
    /// Time of the most recent success.
    pub last_success: Option<DateTime<Utc>>,
    /// Time of the most recent failure.
    pub last_failure: Option<DateTime<Utc>>,
    /// Message of the most recent failure.
    pub last_error: String,
}

impl AgentHealth {
    /// Fraction of calls that succeeded, `0.0` when there were none.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Call counts stay far below 2^52.
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.success_calls as f64 / self.total_calls as f64
    }

    /// Mean call duration, zero when there were no calls.
    #[must_use]
    pub fn avg_duration(&self) -> Duration {
        if self.total_calls == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_duration.as_nanos() / u128::from(self.total_calls);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Serialized view of one agent in the health report.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentHealthView {
    /// Agent name.
    pub agent: String,
    /// All recorded calls.
    pub total_calls: u64,
    /// Successful calls.
    pub success_calls: u64,
    /// Failed calls.
    pub failed_calls: u64,
    /// Timed-out calls.
    pub timeout_calls: u64,
    /// Success percentage, e.g. `"50.0%"`.
    pub success_rate: String,
    /// Mean duration, e.g. `"150ms"`.
    pub avg_duration: String,
    /// RFC 3339 time of the last success.
    pub last_success: Option<String>,
    /// RFC 3339 time of the last failure.
    pub last_failure: Option<String>,
    /// Last failure message.
    pub last_error: String,
}

/// Totals across all agents.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverallHealth {
    /// All recorded calls.
    pub total_calls: u64,
    /// Successful calls.
    pub success_calls: u64,
    /// Success percentage, e.g. `"75.0%"`.
    pub success_rate: String,
}

/// Payload of the health-check tool.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthReport {
    /// Aggregate over every agent.
    pub overall: OverallHealth,
    /// Per-agent breakdown, sorted by agent name.
    pub agents: Vec<AgentHealthView>,
}

impl HealthReport {
    /// Build a report from per-agent snapshots.
    #[must_use]
    pub fn from_snapshots<I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = (String, AgentHealth)>,
    {
        let mut agents: Vec<AgentHealthView> = Vec::new();
        let mut total_calls = 0_u64;
        let mut success_calls = 0_u64;

        for (agent, health) in snapshots {
            total_calls += health.total_calls;
            success_calls += health.success_calls;
            agents.push(AgentHealthView {
                agent,
                total_calls: health.total_calls,
                success_calls: health.success_calls,
                failed_calls: health.failed_calls,
                timeout_calls: health.timeout_calls,
                success_rate: format_percent(health.success_rate()),
                avg_duration: format!("{:?}", health.avg_duration()),
                last_success: health.last_success.map(|ts| ts.to_rfc3339()),
                last_failure: health.last_failure.map(|ts| ts.to_rfc3339()),
                last_error: health.last_error,
            });
        }
        agents.sort_by(|a, b| a.agent.cmp(&b.agent));

        let overall_rate = AgentHealth {
            total_calls,
            success_calls,
            ..AgentHealth::default()
        }
        .success_rate();

        Self {
            overall: OverallHealth {
                total_calls,
                success_calls,
                success_rate: format_percent(overall_rate),
            },
            agents,
        }
    }
}

fn format_percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}
