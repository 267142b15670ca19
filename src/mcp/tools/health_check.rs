//! `health-check` MCP tool handler.
//!
//! Reports per-agent call counts, success rates, average durations and the
//! most recent failure, plus an overall aggregate.

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use tracing::info;

use crate::mcp::handler::SubAgentServer;

/// Handle the `health-check` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` if the report cannot be serialized.
#[allow(clippy::unused_async)] // Tool routes expect a future; the report is in memory.
pub async fn handle(
    context: ToolCallContext<'_, SubAgentServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let report = context.service.state().monitor.report();

    info!(
        agents = report.agents.len(),
        total_calls = report.overall.total_calls,
        "health check served"
    );

    Ok(CallToolResult::success(vec![rmcp::model::Content::json(
        report,
    )
    .map_err(|err| {
        rmcp::ErrorData::internal_error(format!("failed to serialize health report: {err}"), None)
    })?]))
}
