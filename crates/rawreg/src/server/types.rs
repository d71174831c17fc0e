//! Request/response types for MCP tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_accessor() -> String {
    crate::raw_registry::RAW_REG_SCHEME.to_string()
}

/// Request to list a virtual directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadDirRequest {
    /// Scope ID from a previous vfs_open_scope call.
    pub scope_id: String,
    /// Accessor scheme. Defaults to "raw_reg".
    #[serde(default = "default_accessor")]
    pub accessor: String,
    /// Virtual path, e.g. "file:///cases/42/SOFTWARE#Microsoft/Windows".
    pub path: String,
}

/// Request to split a path into root and remainder.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetRootRequest {
    /// Accessor scheme. Defaults to "raw_reg".
    #[serde(default = "default_accessor")]
    pub accessor: String,
    pub path: String,
}

/// Request that names a scope.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScopeRequest {
    pub scope_id: String,
}

/// A newly opened scope.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct OpenScopeResponse {
    pub scope_id: String,
    pub created_at: String,
}

/// Result of a directory listing.
#[derive(Debug, Serialize)]
pub struct ReadDirResponse<'a> {
    pub path: &'a str,
    pub count: usize,
    pub entries: &'a [crate::entry::Entry],
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetRootResponse {
    pub root: String,
    pub fragment: String,
}

/// Summary of an open scope.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ScopeInfo {
    pub scope_id: String,
    /// Accessor schemes instantiated in this scope.
    pub accessors: Vec<String>,
    pub created_at: String,
}

/// Server status information.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ServerStatus {
    pub version: String,
    pub active_scopes: usize,
    pub accessors: Vec<String>,
}
