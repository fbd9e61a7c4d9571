//! SQLite-backed durable state for precaching.
//!
//! Two logical stores live side by side in one database, both partitioned by
//! namespace:
//!
//! - the revision store: identifier -> last synchronized revision
//! - the response cache: identifier -> final HTTP response
//!
//! Every write is a single statement and therefore atomic per key. There is
//! no cross-key transaction; callers order their writes instead.

pub mod connection;
pub mod migrations;
pub mod namespace;
pub mod responses;
pub mod revisions;

use std::collections::BTreeSet;

use async_trait::async_trait;

pub use crate::Error;

pub use connection::CacheDb;
pub use namespace::{Namespace, NamespaceStats, namespace_name};
pub use responses::CachedResponse;

/// Durable mapping from identifier to last synchronized revision.
#[async_trait]
pub trait RevisionStore: Send + Sync {
    async fn revision(&self, key: &str) -> Result<Option<String>, Error>;

    /// Idempotent upsert.
    async fn set_revision(&self, key: &str, revision: &str) -> Result<(), Error>;

    /// Idempotent; deleting an absent key is not an error.
    async fn delete_revision(&self, key: &str) -> Result<(), Error>;

    async fn revision_keys(&self) -> Result<BTreeSet<String>, Error>;
}

/// Durable mapping from identifier to cached response.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn has_response(&self, key: &str) -> Result<bool, Error>;

    async fn response(&self, key: &str) -> Result<Option<CachedResponse>, Error>;

    /// Replaces any prior entry. Readers never observe a partial write.
    async fn put_response(&self, key: &str, response: &CachedResponse) -> Result<(), Error>;

    /// Idempotent; deleting an absent key is not an error.
    async fn delete_response(&self, key: &str) -> Result<(), Error>;

    async fn response_keys(&self) -> Result<BTreeSet<String>, Error>;
}
