//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    LookupParams, RetireParams, StatusParams, SyncParams, lookup_impl, retire_impl, status_impl, sync_impl,
};

use precache_client::Precacher;
use precache_core::CacheDb;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for precache.
#[derive(Clone)]
pub struct PrecacheServer {
    db: CacheDb,
    precacher: Arc<Precacher>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl PrecacheServer {
    /// Create a new server handler.
    pub fn new(db: CacheDb, precacher: Arc<Precacher>) -> Self {
        Self { db, precacher, tool_router: Self::tool_router() }
    }

    /// Bring the active namespace in line with a manifest.
    ///
    /// Only entries whose revision changed (or whose cached response went
    /// missing) are fetched; entries that left the manifest are evicted.
    #[tool(
        description = "Synchronize the precache with a manifest of URLs and revisions. Returns added, updated, unchanged and evicted cache keys."
    )]
    async fn precache_sync(&self, params: Parameters<SyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.precacher, params.0).await
    }

    #[tool(description = "Serve a precached response by URL. Returns status, final URL, headers and body text.")]
    async fn precache_lookup(&self, params: Parameters<LookupParams>) -> Result<CallToolResult, McpError> {
        lookup_impl(&self.precacher, params.0).await
    }

    #[tool(description = "Report the active cache namespace, its entry counts and every stored namespace.")]
    async fn precache_status(&self, params: Parameters<StatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.db, &self.precacher, params.0).await
    }

    #[tool(description = "Delete a superseded cache namespace. The active namespace cannot be retired.")]
    async fn precache_retire(&self, params: Parameters<RetireParams>) -> Result<CallToolResult, McpError> {
        retire_impl(&self.db, &self.precacher, params.0).await
    }
}

impl ServerHandler for PrecacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "precache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
