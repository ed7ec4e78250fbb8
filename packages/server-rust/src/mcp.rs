//! MCP tool surface.
//!
//! Tool calls become pipeline operations; the request `_meta` object carries
//! the tenant metadata the resolver binds before the summary service runs.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::service::RequestContext;
use rmcp::{tool, tool_handler, tool_router, ErrorData, RoleServer, ServerHandler, ServiceExt};
use robot_mcp_core::Metadata;
use tower::ServiceExt as _;
use tracing::{info, warn};

use crate::network::ShutdownController;
use crate::service::{
    next_call_id, service_names, ChatRoomSummaryInput, Operation, OperationContext,
    OperationPipeline, OperationResponse,
};

pub const SERVER_NAME: &str = "wechat-robot-mcp-server";

#[derive(Clone)]
pub struct RobotMcpServer {
    pipeline: OperationPipeline,
    shutdown: Arc<ShutdownController>,
    operation_timeout_ms: u64,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl RobotMcpServer {
    #[must_use]
    pub fn new(
        pipeline: OperationPipeline,
        shutdown: Arc<ShutdownController>,
        operation_timeout_ms: u64,
    ) -> Self {
        Self {
            pipeline,
            shutdown,
            operation_timeout_ms,
            tool_router: Self::tool_router(),
        }
    }

    /// Serves MCP over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        info!("serving MCP over stdio");
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    #[tool(
        name = "ChatRoomSummary",
        description = "微信群聊总结，当用户想总结群聊内容时，可以调用该工具。"
    )]
    async fn chat_room_summary(
        &self,
        Parameters(input): Parameters<ChatRoomSummaryInput>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run_summary(Some(context.meta.0), input).await)
    }

    /// Runs one summary operation; failures become tool-level errors.
    async fn run_summary(&self, meta: Option<Metadata>, input: ChatRoomSummaryInput) -> CallToolResult {
        let _guard = self.shutdown.in_flight_guard();

        let op = Operation::ChatRoomSummary {
            ctx: OperationContext::new(
                next_call_id(),
                service_names::CHAT_ROOM_SUMMARY,
                self.operation_timeout_ms,
            ),
            meta,
            input,
        };

        match self.pipeline.clone().oneshot(op).await {
            Ok(OperationResponse::Text(text)) => CallToolResult::success(vec![Content::text(text)]),
            Ok(other) => {
                warn!(response = ?other, "unexpected summary response");
                CallToolResult::error(vec![Content::text("unexpected response")])
            }
            Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
        }
    }
}

#[tool_handler]
impl ServerHandler for RobotMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("WeChat robot tools (ChatRoomSummary)".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }
}
