//! precache_lookup tool implementation.
//!
//! Serves a precached response by identifier.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use precache_client::Precacher;
use precache_core::Error;

/// Parameters for the precache_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LookupParams {
    /// Identifier to serve, absolute or relative to the scope.
    pub url: String,
}

/// Output from the precache_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LookupOutput {
    pub url: String,
    pub status: u16,
    /// URL the body was served from, after redirects.
    pub final_url: String,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub opaque: bool,
    /// Body length in bytes.
    pub bytes: usize,
    /// Body text, `null` for opaque or non UTF-8 bodies.
    pub text: Option<String>,
    pub fetched_at: String,
}

/// Implementation of the precache_lookup tool.
pub async fn lookup_impl(precacher: &Precacher, params: LookupParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let response = precacher
        .lookup(&params.url)
        .await?
        .ok_or_else(|| Error::CacheMiss(params.url.clone()))?;

    let output = LookupOutput {
        url: params.url,
        status: response.status,
        content_type: response.content_type().map(str::to_string),
        text: response.text().map(str::to_string),
        bytes: response.body.len(),
        final_url: response.final_url,
        headers: response.headers,
        opaque: response.opaque,
        fetched_at: response.fetched_at,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
