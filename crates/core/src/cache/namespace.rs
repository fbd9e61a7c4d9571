//! Cache namespaces.
//!
//! A namespace is one logical cache generation. Every revision record and
//! every cached response belongs to exactly one namespace, and a pass only
//! ever touches the namespace handle it was given.

use super::connection::CacheDb;
use crate::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio_rusqlite::params;

/// Derive the namespace name for a scope.
///
/// The scope URL is hashed so that distinct scopes never share a
/// namespace while names stay short and filesystem/SQL friendly.
pub fn namespace_name(prefix: &str, scope_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope_url.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{prefix}-{}", &digest[..16])
}

/// Handle to one namespace inside a [`CacheDb`].
#[derive(Clone, Debug)]
pub struct Namespace {
    pub(crate) db: CacheDb,
    pub(crate) name: String,
}

/// Summary of what a namespace currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NamespaceStats {
    pub name: String,
    /// Number of cached responses.
    pub entries: u64,
    /// Number of revision records.
    pub revisions: u64,
    /// Sum of cached body sizes.
    pub total_bytes: u64,
    /// Most recent fetch time (RFC 3339).
    pub last_fetched_at: Option<String>,
}

impl Namespace {
    pub(crate) fn new(db: CacheDb, name: String) -> Self {
        Self { db, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn stats(&self) -> Result<NamespaceStats, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<NamespaceStats, Error> {
                let (entries, total_bytes, last_fetched_at): (i64, i64, Option<String>) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(LENGTH(body)), 0), MAX(fetched_at)
                     FROM responses WHERE namespace = ?1",
                    params![name],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;
                let revisions: i64 =
                    conn.query_row("SELECT COUNT(*) FROM revisions WHERE namespace = ?1", params![name], |row| {
                        row.get(0)
                    })?;

                Ok(NamespaceStats {
                    name,
                    entries: entries as u64,
                    revisions: revisions as u64,
                    total_bytes: total_bytes as u64,
                    last_fetched_at,
                })
            })
            .await
            .map_err(Error::from)
    }
}
