//! MCP server handler, shared application state, and tool router.

use std::future::Future;
use std::sync::Arc;

use rmcp::handler::server::{
    tool::{ToolCallContext, ToolRoute, ToolRouter},
    ServerHandler,
};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ListToolsResult, PaginatedRequestParam,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use tracing::info_span;

use crate::catalog::registry::RegisteredAgent;
use crate::config::GlobalConfig;
use crate::orchestrator::executor::Executor;
use crate::orchestrator::health::HealthMonitor;
use crate::orchestrator::session_manager::SessionManager;

/// Shared application state accessible by all MCP tool handlers.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Session workspace manager.
    pub sessions: Arc<SessionManager>,
    /// Agent execution engine.
    pub executor: Arc<Executor>,
    /// Per-agent health accounting, shared with the executor.
    pub monitor: Arc<HealthMonitor>,
    /// Agents exposed as tools.
    pub agents: Vec<RegisteredAgent>,
}

/// MCP server exposing one tool per registered agent plus `health-check`.
#[derive(Clone)]
pub struct SubAgentServer {
    state: Arc<AppState>,
}

impl SubAgentServer {
    /// Create a new MCP server bound to shared application state.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Access the shared application state.
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    fn tool_router(&self) -> ToolRouter<Self> {
        let mut router = ToolRouter::new();

        for agent in &self.state.agents {
            let tool = agent_tool(agent);
            let agent = agent.clone();
            router.add_route(ToolRoute::new_dyn(tool, move |context| {
                Box::pin(crate::mcp::tools::invoke_agent::handle(
                    context,
                    agent.clone(),
                ))
            }));
        }

        router.add_route(ToolRoute::new_dyn(
            health_tool(&self.state.config),
            |context| Box::pin(crate::mcp::tools::health_check::handle(context)),
        ));

        router
    }

    /// Every tool this server exposes, agents first.
    #[must_use]
    pub fn all_tools(&self) -> Vec<Tool> {
        self.state
            .agents
            .iter()
            .map(agent_tool)
            .chain(std::iter::once(health_tool(&self.state.config)))
            .collect()
    }
}

/// Convert a `serde_json::Value::Object` into the `Arc<Map>` expected by `Tool`.
fn schema(value: serde_json::Value) -> Arc<serde_json::Map<String, serde_json::Value>> {
    match value {
        serde_json::Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::default()),
    }
}

/// Tool definition for one agent.
#[must_use]
pub fn agent_tool(agent: &RegisteredAgent) -> Tool {
    Tool::new(
        agent.tool_name.clone(),
        agent.description.clone(),
        schema(serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Task for the sub-agent."
                },
                "sessionId": {
                    "type": "string",
                    "description": "Session id from a previous call; omit to start a new session."
                },
                "directory": {
                    "type": "string",
                    "description": "Absolute path of the directory the sub-agent should work in."
                }
            },
            "required": ["prompt", "directory"]
        })),
    )
}

/// Tool definition for the aggregate health check.
#[must_use]
pub fn health_tool(config: &GlobalConfig) -> Tool {
    Tool::new(
        config.health_tool_name(),
        "Get health metrics for all sub-agents including success rates, average duration, \
         and failure counts",
        schema(serde_json::json!({
            "type": "object",
            "properties": {}
        })),
    )
}

impl ServerHandler for SubAgentServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Each tool runs a kiro-cli sub-agent. Pass the returned sessionId back to \
                 continue the same conversation."
                    .into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, rmcp::ErrorData>> + Send + '_ {
        let router = self.tool_router();
        let _span = info_span!("call_tool", tool = %request.name).entered();

        async move {
            router
                .call(ToolCallContext::new(self, request, context))
                .await
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, rmcp::ErrorData>> + Send + '_ {
        let tools = self.all_tools();

        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }
}
