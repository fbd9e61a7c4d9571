//! Fetch-and-store executor.
//!
//! Fetches one identifier, resolves any redirect chain to its final
//! response, and commits it: response first, revision second. A crash
//! between the two writes leaves a cached-but-unrecorded entry, which the
//! next pass classifies as needing a fetch and overwrites.

use std::sync::Arc;

use ::url::Url;
use precache_core::{CachedResponse, Error, FetchError, FetchErrorKind, ResponseCache, RevisionStore};

use crate::fetch::{Network, NetworkResponse, Scope};

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub final_url: String,
    pub bytes: usize,
    pub opaque: bool,
}

/// Fetches identifiers and commits them into the stores.
pub struct FetchAndStore {
    network: Arc<dyn Network>,
    responses: Arc<dyn ResponseCache>,
    revisions: Arc<dyn RevisionStore>,
    scope: Scope,
    max_redirects: usize,
    cache_bust: bool,
}

impl FetchAndStore {
    pub fn new(
        network: Arc<dyn Network>, responses: Arc<dyn ResponseCache>, revisions: Arc<dyn RevisionStore>, scope: Scope,
    ) -> Self {
        Self { network, responses, revisions, scope, max_redirects: 5, cache_bust: true }
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_cache_bust(mut self, cache_bust: bool) -> Self {
        self.cache_bust = cache_bust;
        self
    }

    /// Fetch `url` (a resolved cache key) and commit it under `revision`.
    ///
    /// On a fetch failure neither store is written.
    pub async fn fetch_and_store(&self, url: &Url, revision: &str) -> Result<Committed, Error> {
        let key = url.as_str();
        let response = self.fetch_final(url, revision).await.map_err(|kind| FetchError::new(key, kind))?;

        let final_url = self.scope.strip_revision_marker(&response.url);
        let opaque = !self.scope.is_same_origin(&final_url);

        let mut cached =
            CachedResponse::new(response.status, final_url.as_str(), response.body.to_vec()).with_opaque(opaque);
        for (name, value) in &response.headers {
            cached = cached.with_header(name, value.as_str());
        }

        self.responses.put_response(key, &cached).await?;
        self.revisions.set_revision(key, revision).await?;

        tracing::debug!(key, revision, final_url = %final_url, opaque, bytes = cached.body.len(), "committed");

        Ok(Committed { final_url: final_url.into(), bytes: cached.body.len(), opaque })
    }

    /// Issue the request and follow any redirects the network surfaced.
    async fn fetch_final(&self, url: &Url, revision: &str) -> Result<NetworkResponse, FetchErrorKind> {
        let mut target = if self.cache_bust { self.scope.fetch_target(url, revision) } else { url.clone() };
        let mut hops = 0;

        loop {
            let response = self.network.request(&target).await?;

            if response.is_redirect() {
                hops += 1;
                if hops > self.max_redirects {
                    return Err(FetchErrorKind::TooManyRedirects(self.max_redirects));
                }
                let location = response.header("location").ok_or(FetchErrorKind::MissingLocation)?;
                target = response
                    .url
                    .join(location)
                    .map_err(|e| FetchErrorKind::InvalidRedirect(format!("{location}: {e}")))?;
                tracing::debug!(from = %response.url, to = %target, hops, "following redirect");
                continue;
            }

            if !response.is_success() {
                return Err(FetchErrorKind::Status(response.status));
            }

            return Ok(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::{MockNetwork, Route};
    use precache_core::CacheDb;

    const SCOPE: &str = "https://example.com/app/";

    async fn setup() -> (Arc<MockNetwork>, precache_core::Namespace, FetchAndStore) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = db.namespace("precache-test");
        let network = Arc::new(MockNetwork::new());
        let scope = Scope::new(SCOPE, "__precache_revision").unwrap();
        let executor = FetchAndStore::new(network.clone(), Arc::new(ns.clone()), Arc::new(ns.clone()), scope);
        (network, ns, executor)
    }

    fn url(path: &str) -> Url {
        Url::parse(SCOPE).unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_commits_response_then_revision() {
        let (network, ns, executor) = setup().await;
        network.serve("https://example.com/app/a.txt", "hello");

        let committed = executor.fetch_and_store(&url("a.txt"), "1").await.unwrap();
        assert_eq!(committed.final_url, "https://example.com/app/a.txt");
        assert!(!committed.opaque);

        let key = "https://example.com/app/a.txt";
        let stored = ns.response(key).await.unwrap().unwrap();
        assert_eq!(stored.text(), Some("hello"));
        assert_eq!(stored.header("Content-Type"), Some("text/plain"));
        assert_eq!(ns.revision(key).await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_request_carries_revision_marker() {
        let (network, _ns, executor) = setup().await;
        network.serve("https://example.com/app/a.txt", "hello");

        executor.fetch_and_store(&url("a.txt"), "v2").await.unwrap();
        assert_eq!(network.requests(), vec!["https://example.com/app/a.txt?__precache_revision=v2"]);
    }

    #[tokio::test]
    async fn test_cache_bust_disabled() {
        let (network, _ns, executor) = setup().await;
        let executor = executor.with_cache_bust(false);
        network.serve("https://example.com/app/a.txt", "hello");

        executor.fetch_and_store(&url("a.txt"), "v2").await.unwrap();
        assert_eq!(network.requests(), vec!["https://example.com/app/a.txt"]);
    }

    #[tokio::test]
    async fn test_redirect_chain_stores_final_body() {
        let (network, ns, executor) = setup().await;
        network.redirect("https://example.com/app/redirect/one", "/app/redirect/two");
        network.redirect("https://example.com/app/redirect/two", "final");
        network.serve("https://example.com/app/redirect/final", "final");

        let committed = executor.fetch_and_store(&url("redirect/one"), "1").await.unwrap();
        assert_eq!(committed.final_url, "https://example.com/app/redirect/final");

        let stored = ns.response("https://example.com/app/redirect/one").await.unwrap().unwrap();
        assert_eq!(stored.status, 200);
        assert_eq!(stored.text(), Some("final"));
        assert_eq!(stored.final_url, "https://example.com/app/redirect/final");
        assert!(ns.response("https://example.com/app/redirect/final").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_too_many_redirects() {
        let (network, ns, executor) = setup().await;
        let executor = executor.with_max_redirects(1);
        network.redirect("https://example.com/app/a", "b");
        network.redirect("https://example.com/app/b", "c");
        network.serve("https://example.com/app/c", "c");

        let err = executor.fetch_and_store(&url("a"), "1").await.unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError { kind: FetchErrorKind::TooManyRedirects(1), .. })));
        assert!(ns.response_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_without_location() {
        let (network, _ns, executor) = setup().await;
        network.route("https://example.com/app/a", Route::Redirect { status: 301, location: None });

        let err = executor.fetch_and_store(&url("a"), "1").await.unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError { kind: FetchErrorKind::MissingLocation, .. })));
    }

    #[tokio::test]
    async fn test_cross_origin_is_opaque_but_cached() {
        let (network, ns, executor) = setup().await;
        network.serve("https://cdn.example.net/lib.js", "lib");

        let target = Url::parse("https://cdn.example.net/lib.js").unwrap();
        let committed = executor.fetch_and_store(&target, "1").await.unwrap();
        assert!(committed.opaque);

        let stored = ns.response("https://cdn.example.net/lib.js").await.unwrap().unwrap();
        assert!(stored.opaque);
        assert_eq!(stored.body, b"lib");
        assert_eq!(stored.text(), None);
    }

    #[tokio::test]
    async fn test_failure_writes_nothing() {
        let (network, ns, executor) = setup().await;
        network.route("https://example.com/app/missing", Route::Body { status: 500, body: Vec::new() });
        network.fail("https://example.com/app/down", FetchErrorKind::Network("connection refused".into()));

        let err = executor.fetch_and_store(&url("missing"), "1").await.unwrap_err();
        assert!(matches!(&err, Error::Fetch(e) if e.kind == FetchErrorKind::Status(500)
            && e.identifier == "https://example.com/app/missing"));

        let err = executor.fetch_and_store(&url("down"), "1").await.unwrap_err();
        assert_eq!(err.kind(), precache_core::ErrorKind::Fetch);

        assert!(ns.response_keys().await.unwrap().is_empty());
        assert!(ns.revision_keys().await.unwrap().is_empty());
    }
}
