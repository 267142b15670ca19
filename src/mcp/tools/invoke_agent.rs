//! Per-agent MCP tool handler.
//!
//! Resolves the session workspace, composes the prompt, runs the agent
//! through the executor and reconciles the final response. Agent failures
//! are reported in-band as an `ERROR: ...` response together with the
//! session id, so the calling orchestrator can decide whether to retry.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use crate::catalog::registry::RegisteredAgent;
use crate::mcp::handler::{AppState, SubAgentServer};
use crate::models::invocation::{InvocationRequest, ResponseFile};
use crate::orchestrator::command::CONTAINER_WORKSPACE_DIR;
use crate::orchestrator::prompt::{compose_prompt, load_template};
use crate::orchestrator::recovery::{artifact_path, ResponseRecovery};
use crate::Result;

/// Input parameters of every agent tool.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentToolInput {
    /// Task for the sub-agent.
    #[serde(default)]
    prompt: String,
    /// Session to continue; absent for a new session.
    #[serde(default)]
    session_id: Option<String>,
    /// Directory the sub-agent works on.
    #[serde(default)]
    directory: String,
}

/// Result payload of every agent tool.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentToolOutput {
    /// Response text, or `ERROR: ...` when the agent failed.
    pub response: String,
    /// Session id to pass back for follow-up calls.
    pub session_id: String,
}

/// Handle a call to an agent tool.
///
/// # Errors
///
/// Returns `invalid_params` when `prompt` or `directory` is missing and
/// `internal_error` when the session workspace cannot be prepared.
pub async fn handle(
    context: ToolCallContext<'_, SubAgentServer>,
    agent: RegisteredAgent,
) -> std::result::Result<CallToolResult, rmcp::ErrorData> {
    let state = Arc::clone(context.service.state());
    let cancel = context.request_context.ct.clone();
    let args: serde_json::Map<String, serde_json::Value> = context.arguments.unwrap_or_default();

    let input: AgentToolInput =
        serde_json::from_value(serde_json::Value::Object(args)).map_err(|err| {
            rmcp::ErrorData::invalid_params(
                format!("invalid {} parameters: {err}", agent.tool_name),
                None,
            )
        })?;

    if input.prompt.trim().is_empty() {
        return Err(rmcp::ErrorData::invalid_params("prompt is required", None));
    }
    if input.directory.trim().is_empty() {
        return Err(rmcp::ErrorData::invalid_params("directory is required", None));
    }

    let span = info_span!(
        "agent_tool",
        tool = %agent.tool_name,
        agent = %agent.agent_name,
        resumed = input.session_id.is_some(),
    );

    async move {
        let output = run_agent(
            &state,
            &agent,
            &input.prompt,
            input.session_id.as_deref(),
            &input.directory,
            &cancel,
        )
        .await
        .map_err(|err| {
            rmcp::ErrorData::internal_error(format!("failed to prepare workspace: {err}"), None)
        })?;

        Ok(CallToolResult::success(vec![rmcp::model::Content::json(
            output,
        )
        .map_err(|err| {
            rmcp::ErrorData::internal_error(
                format!("failed to serialize agent response: {err}"),
                None,
            )
        })?]))
    }
    .instrument(span)
    .await
}

/// Run one agent tool call end to end.
///
/// # Errors
///
/// Returns an error only when the session workspace cannot be resolved or
/// created. Agent execution failures are encoded in the returned response.
pub async fn run_agent(
    state: &AppState,
    agent: &RegisteredAgent,
    prompt: &str,
    session_id: Option<&str>,
    directory: &str,
    cancel: &CancellationToken,
) -> Result<AgentToolOutput> {
    let resume = session_id.is_some_and(|id| !id.trim().is_empty());
    let (workspace, session_id) = state.sessions.acquire(session_id).await?;

    let response_file = ResponseFile::generate();
    let response_path = artifact_path(&workspace, &response_file);
    let working_dir = if workspace.is_isolated() {
        CONTAINER_WORKSPACE_DIR
    } else {
        directory
    };

    let system_template = load_template(&state.config.system_prompt_path).await;
    let request = InvocationRequest {
        agent: agent.agent_name.clone(),
        prompt: compose_prompt(prompt, working_dir, system_template.as_deref(), &response_path),
        workspace,
        resume,
        model: Some(agent.model.clone()),
        task_dir: Some(PathBuf::from(directory)),
        response_file,
    };

    let first = state.executor.execute(&request, cancel).await;
    let fallback_template = if first.is_success() {
        load_template(&state.config.context_summary_path).await
    } else {
        None
    };

    let reconciled = ResponseRecovery::new(&state.executor)
        .reconcile(&request, &first, fallback_template.as_deref(), cancel)
        .await;

    info!(
        session_id = %session_id,
        source = ?reconciled.source,
        retried = first.retried,
        "agent tool call complete"
    );

    Ok(AgentToolOutput {
        response: reconciled.text,
        session_id,
    })
}
