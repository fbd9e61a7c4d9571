//! precache_sync tool implementation.
//!
//! Runs one synchronization pass against the supplied manifest.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use precache_client::{Precacher, SyncResult};
use precache_core::{Error, RawEntry};

use crate::error::sync_failure;

/// Parameters for the precache_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncParams {
    /// Manifest entries: a URL string, or an object with `url` and an
    /// optional `revision`. Relative URLs resolve against the scope.
    pub manifest: Vec<RawEntry>,
}

/// Output from the precache_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncOutput {
    /// Namespace the pass ran against.
    pub namespace: String,
    #[serde(flatten)]
    pub result: SyncResult,
}

/// Implementation of the precache_sync tool.
pub async fn sync_impl(precacher: &Precacher, params: SyncParams) -> Result<CallToolResult, McpError> {
    let result = precacher.synchronize(&params.manifest).await.map_err(sync_failure)?;

    let output = SyncOutput { namespace: precacher.namespace().to_string(), result };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{json_content, precacher};

    fn params(json: serde_json::Value) -> SyncParams {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn test_sync_mixed_manifest() {
        let (_db, precacher) = precacher(&[("/app/a.txt", "a"), ("/app/b.js", "b")]).await;
        let params = params(serde_json::json!({
            "manifest": ["a.txt", {"url": "b.js", "revision": "7"}]
        }));

        let result = sync_impl(&precacher, params).await.unwrap();
        let output = json_content(&result);

        assert_eq!(output["namespace"], "precache-revisioned-test");
        assert_eq!(output["added"].as_array().unwrap().len(), 2);
        assert_eq!(output["fetches"], 2);
    }

    #[tokio::test]
    async fn test_sync_twice_is_unchanged() {
        let (_db, precacher) = precacher(&[("/app/a.txt", "a")]).await;

        sync_impl(&precacher, params(serde_json::json!({"manifest": ["a.txt"]}))).await.unwrap();
        let result = sync_impl(&precacher, params(serde_json::json!({"manifest": ["a.txt"]}))).await.unwrap();
        let output = json_content(&result);

        assert_eq!(output["fetches"], 0);
        assert_eq!(output["unchanged"][0], "https://example.com/app/a.txt");
    }

    #[tokio::test]
    async fn test_sync_fetch_failure() {
        let (_db, precacher) = precacher(&[("/app/a.txt", "a")]).await;
        let params = params(serde_json::json!({"manifest": ["a.txt", "missing.txt"]}));

        let err = sync_impl(&precacher, params).await.unwrap_err();
        assert_eq!(err.code.0, -32008);
        assert!(err.message.contains("missing.txt"));
        let data = err.data.unwrap();
        assert_eq!(data["phase"], "fetching");
        assert_eq!(data["partial"]["added"][0], "https://example.com/app/a.txt");
    }

    #[tokio::test]
    async fn test_sync_malformed_manifest() {
        let (_db, precacher) = precacher(&[]).await;
        let params = params(serde_json::json!({"manifest": [{"revision": "1"}]}));

        let err = sync_impl(&precacher, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
        assert!(err.message.contains("MANIFEST_ERROR"));
    }
}
