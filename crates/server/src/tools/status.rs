//! precache_status tool implementation.
//!
//! Reports the active namespace and every generation in the store.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use precache_client::Precacher;
use precache_core::{CacheDb, Error, NamespaceStats};

/// Parameters for the precache_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StatusParams {}

/// Output from the precache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusOutput {
    /// Namespace passes run against.
    pub namespace: String,
    pub scope_url: String,
    /// Every namespace holding any state, active one included.
    pub namespaces: Vec<String>,
    pub stats: NamespaceStats,
}

/// Implementation of the precache_status tool.
pub async fn status_impl(
    db: &CacheDb, precacher: &Precacher, _params: StatusParams,
) -> Result<CallToolResult, McpError> {
    let stats = db.namespace(precacher.namespace()).stats().await?;
    let namespaces = db.namespaces().await?;

    let output = StatusOutput {
        namespace: precacher.namespace().to_string(),
        scope_url: precacher.scope().base().to_string(),
        namespaces,
        stats,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
