//! MCP tool definitions for the rawreg server.

use crate::accessor::AccessorRegistry;
use crate::error::AccessorError;
use crate::server::session::ScopeStore;
use crate::server::types::*;
use rmcp::handler::server::{router::tool::ToolRouter, wrapper::Parameters};
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Map accessor errors onto MCP errors: caller mistakes are invalid params,
/// everything else is internal.
fn to_mcp_error(e: AccessorError) -> McpError {
    match e {
        AccessorError::MalformedPath(_)
        | AccessorError::UnknownAccessor(_)
        | AccessorError::KeyNotFound(_)
        | AccessorError::NotImplemented { .. } => McpError::invalid_params(e.to_string(), None),
        _ => McpError::internal_error(e.to_string(), None),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization failed: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

/// The rawreg MCP server.
#[derive(Clone)]
pub struct RawRegServer {
    sessions: ScopeStore,
    registry: Arc<AccessorRegistry>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl RawRegServer {
    pub fn new(registry: Arc<AccessorRegistry>) -> Self {
        RawRegServer {
            sessions: ScopeStore::new(),
            registry,
            tool_router: Self::tool_router(),
        }
    }

    /// Open a new cancellation scope.
    #[tool(description = "Open a new accessor scope. Returns a scope_id; hives opened by listings in this scope stay cached until vfs_close_scope is called.")]
    async fn vfs_open_scope(&self) -> Result<CallToolResult, McpError> {
        let session = self.sessions.create().await;
        info!("Opened scope {}", session.id);
        json_result(&OpenScopeResponse {
            scope_id: session.id.clone(),
            created_at: session.created_at.to_rfc3339(),
        })
    }

    /// List a virtual directory.
    #[tool(description = "List the children of a virtual path. Fields: scope_id, accessor (default \"raw_reg\"), path. For raw_reg the path is \"file:///path/to/hive#Key/Subkey\"; keys list as directories, values as leaves with decoded data.")]
    async fn vfs_read_dir(
        &self,
        Parameters(req): Parameters<ReadDirRequest>,
    ) -> Result<CallToolResult, McpError> {
        let session = self.sessions.get(&req.scope_id).await.ok_or_else(|| {
            McpError::invalid_params(format!("Scope not found: {}", req.scope_id), None)
        })?;
        let accessor = session
            .accessor(&self.registry, &req.accessor)
            .map_err(to_mcp_error)?;

        // Hive opens and cell reads are blocking I/O.
        let path = req.path.clone();
        let entries = tokio::task::spawn_blocking(move || accessor.read_dir(&path))
            .await
            .map_err(|e| McpError::internal_error(format!("Listing task failed: {}", e), None))?
            .map_err(to_mcp_error)?;

        json_result(&ReadDirResponse {
            path: &req.path,
            count: entries.len(),
            entries: &entries,
        })
    }

    /// Split a path into its root and in-container remainder.
    #[tool(description = "Split a virtual path into its stable root address and the remaining path inside it. Fields: accessor (default \"raw_reg\"), path.")]
    async fn vfs_get_root(
        &self,
        Parameters(req): Parameters<GetRootRequest>,
    ) -> Result<CallToolResult, McpError> {
        // Path utilities do not depend on scope state; a throwaway scope is
        // enough to instantiate the accessor.
        let scope = crate::scope::Scope::new();
        let accessor = self
            .registry
            .resolve(&req.accessor, &scope)
            .map_err(to_mcp_error)?;
        let result = accessor.get_root(&req.path).map_err(to_mcp_error);
        drop(accessor);
        tokio::task::spawn_blocking(move || scope.close())
            .await
            .map_err(|e| McpError::internal_error(format!("Scope teardown failed: {}", e), None))?;

        let (root, fragment) = result?;
        json_result(&GetRootResponse { root, fragment })
    }

    /// Close a scope, releasing every cached hive.
    #[tool(description = "Close an accessor scope. All hives cached by listings in the scope are closed.")]
    async fn vfs_close_scope(
        &self,
        Parameters(req): Parameters<ScopeRequest>,
    ) -> Result<CallToolResult, McpError> {
        if !self.sessions.close(&req.scope_id).await {
            return Err(McpError::invalid_params(
                format!("Scope not found: {}", req.scope_id),
                None,
            ));
        }
        info!("Closed scope {}", req.scope_id);
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Scope {} closed",
            req.scope_id
        ))]))
    }

    /// List all open scopes.
    #[tool(description = "List all open accessor scopes with the accessors instantiated in each.")]
    async fn vfs_list_scopes(&self) -> Result<CallToolResult, McpError> {
        let infos: Vec<ScopeInfo> = self
            .sessions
            .list()
            .await
            .into_iter()
            .map(|(scope_id, accessors, created_at)| ScopeInfo {
                scope_id,
                accessors,
                created_at,
            })
            .collect();
        json_result(&infos)
    }

    /// List registered accessor schemes.
    #[tool(description = "List the accessor schemes registered with this server.")]
    async fn vfs_list_accessors(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.registry.schemes())
    }

    /// Get server status.
    #[tool(description = "Get rawreg server status including version, open scope count, and registered accessors.")]
    async fn vfs_get_status(&self) -> Result<CallToolResult, McpError> {
        json_result(&ServerStatus {
            version: VERSION.to_string(),
            active_scopes: self.sessions.count().await,
            accessors: self.registry.schemes(),
        })
    }
}

#[tool_handler]
impl ServerHandler for RawRegServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "rawreg: virtual filesystem accessors for forensic evidence. \
                 Registry hives are browsed as directory trees through the raw_reg accessor.\n\
                 Start with vfs_open_scope, then call vfs_read_dir with a path like \
                 \"file:///cases/42/SOFTWARE#Microsoft/Windows\". \
                 Call vfs_close_scope when done to release the hive files."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
