//! precache_retire tool implementation.
//!
//! Drops a superseded cache generation. The active namespace is only ever
//! changed by a pass, so it cannot be retired here.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use precache_client::Precacher;
use precache_core::{CacheDb, Error};

/// Parameters for the precache_retire tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RetireParams {
    /// Name of the namespace to delete.
    pub namespace: String,
}

/// Output from the precache_retire tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RetireOutput {
    pub namespace: String,
    /// Cached responses removed.
    pub deleted: u64,
}

/// Implementation of the precache_retire tool.
pub async fn retire_impl(
    db: &CacheDb, precacher: &Precacher, params: RetireParams,
) -> Result<CallToolResult, McpError> {
    let name = params.namespace.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("namespace cannot be empty".into()).into());
    }
    if name == precacher.namespace() {
        return Err(Error::InvalidInput(format!("{name} is the active namespace")).into());
    }
    if !db.namespaces().await?.iter().any(|n| n == name) {
        return Err(Error::CacheMiss(name.to_string()).into());
    }

    let deleted = db.delete_namespace(name).await?;
    tracing::info!(namespace = name, deleted, "retired namespace");

    let output = RetireOutput { namespace: name.to_string(), deleted };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{json_content, precacher};
    use precache_core::{CachedResponse, ResponseCache, RevisionStore};

    #[tokio::test]
    async fn test_retire_old_generation() {
        let (db, precacher) = precacher(&[]).await;
        let old = db.namespace("precache-revisioned-old");
        let key = "https://example.com/app/a.txt";
        old.put_response(key, &CachedResponse::new(200, key, b"a".to_vec())).await.unwrap();
        old.set_revision(key, "1").await.unwrap();

        let params = RetireParams { namespace: "precache-revisioned-old".into() };
        let result = retire_impl(&db, &precacher, params).await.unwrap();
        let output = json_content(&result);

        assert_eq!(output["deleted"], 1);
        assert!(db.namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retire_active_namespace_rejected() {
        let (db, precacher) = precacher(&[]).await;
        let params = RetireParams { namespace: precacher.namespace().to_string() };

        let err = retire_impl(&db, &precacher, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_retire_unknown_namespace() {
        let (db, precacher) = precacher(&[]).await;
        let params = RetireParams { namespace: "precache-revisioned-nope".into() };

        let err = retire_impl(&db, &precacher, params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }
}
