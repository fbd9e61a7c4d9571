//! MCP error mapping for failed passes.
//!
//! Plain [`precache_core::Error`] values convert into MCP errors directly.
//! A failed pass carries more than its error, so the phase and the partial
//! result travel in the error's `data` field.

use precache_client::SyncFailure;
use rmcp::model::ErrorData as McpError;
use serde_json::json;

pub fn sync_failure(failure: SyncFailure) -> McpError {
    let SyncFailure { error, phase, partial } = failure;
    let mut err = McpError::from(error);
    err.data = Some(json!({ "phase": phase, "partial": partial }));
    err
}
