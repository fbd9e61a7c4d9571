//! Scope-relative URL resolution and cache-key normalization.
//!
//! ### Cache keys
//! - Resolve the identifier against the scope URL
//! - Only http and https are accepted
//! - Remove the fragment
//! - Remove the revision marker query parameter, keep the rest of the query
//!   untouched (no reordering)

use std::borrow::Cow;

use url::{Url, form_urlencoded};

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// The precaching scope: base URL plus the rules that turn identifiers into
/// cache keys.
#[derive(Debug, Clone)]
pub struct Scope {
    base: Url,
    revision_param: String,
    ignore_url_parameters: Vec<String>,
    directory_index: Option<String>,
}

impl Scope {
    pub fn new(base: &str, revision_param: impl Into<String>) -> Result<Self, UrlError> {
        let base = Url::parse(base.trim()).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        check_scheme(&base)?;

        Ok(Self {
            base,
            revision_param: revision_param.into(),
            ignore_url_parameters: Vec::new(),
            directory_index: None,
        })
    }

    /// Rules applied only by [`Scope::lookup_candidates`].
    pub fn with_lookup_rules(mut self, ignore_url_parameters: Vec<String>, directory_index: Option<String>) -> Self {
        self.ignore_url_parameters = ignore_url_parameters;
        self.directory_index = directory_index;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve an identifier to its canonical absolute URL.
    pub fn resolve(&self, identifier: &str) -> Result<Url, UrlError> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(UrlError::Empty);
        }

        let mut url = self.base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        check_scheme(&url)?;

        url.set_fragment(None);
        Ok(self.strip_revision_marker(&url))
    }

    /// Cache key for an identifier.
    pub fn cache_key(&self, identifier: &str) -> Result<String, UrlError> {
        self.resolve(identifier).map(String::from)
    }

    /// Network target for a resolved URL, carrying the revision marker.
    pub fn fetch_target(&self, url: &Url, revision: &str) -> Url {
        let mut target = url.clone();
        target.query_pairs_mut().append_pair(&self.revision_param, revision);
        target
    }

    pub fn strip_revision_marker(&self, url: &Url) -> Url {
        strip_params(url, |name| name == self.revision_param)
    }

    /// Whether a response from `url` may be introspected by scope clients.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.base.origin()
    }

    /// Keys to try, in order, when serving `identifier` from the cache.
    pub fn lookup_candidates(&self, identifier: &str) -> Result<Vec<String>, UrlError> {
        let exact = self.resolve(identifier)?;
        let mut candidates = vec![exact.to_string()];

        let stripped = strip_params(&exact, |name| self.ignore_url_parameters.iter().any(|p| name.starts_with(p)));
        push_unique(&mut candidates, stripped.to_string());

        if let Some(index) = &self.directory_index {
            for url in [exact, stripped] {
                if url.path().ends_with('/') {
                    let mut with_index = url.clone();
                    with_index.set_path(&format!("{}{index}", url.path()));
                    push_unique(&mut candidates, with_index.to_string());
                }
            }
        }

        Ok(candidates)
    }
}

fn check_scheme(url: &Url) -> Result<(), UrlError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
}

fn push_unique(candidates: &mut Vec<String>, candidate: String) {
    if !candidates.contains(&candidate) {
        candidates.push(candidate);
    }
}

/// Remove query parameters whose decoded name matches. Surviving segments
/// are kept byte for byte, so encodings and valueless parameters survive.
fn strip_params(url: &Url, matches: impl Fn(&str) -> bool) -> Url {
    let mut url = url.clone();
    let Some(query) = url.query() else {
        return url;
    };

    let segments: Vec<&str> = query.split('&').collect();
    let kept: Vec<&str> = segments
        .iter()
        .copied()
        .filter(|segment| !param_name(segment).is_some_and(|name| matches(&*name)))
        .collect();
    if kept.len() == segments.len() {
        return url;
    }

    let kept = kept.join("&");
    url.set_query(if kept.is_empty() { None } else { Some(kept.as_str()) });
    url
}

fn param_name(segment: &str) -> Option<Cow<'_, str>> {
    form_urlencoded::parse(segment.as_bytes()).next().map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new("https://example.com/app/sw.js", "__precache_revision")
            .unwrap()
            .with_lookup_rules(vec!["utm_".into()], Some("index.html".into()))
    }

    #[test]
    fn test_resolve_relative() {
        let scope = scope();
        assert_eq!(scope.cache_key("a.js").unwrap(), "https://example.com/app/a.js");
        assert_eq!(scope.cache_key("./a.js").unwrap(), "https://example.com/app/a.js");
        assert_eq!(scope.cache_key("/root.css").unwrap(), "https://example.com/root.css");
        assert_eq!(scope.cache_key("../up.css").unwrap(), "https://example.com/up.css");
    }

    #[test]
    fn test_resolve_absolute_and_aliases_match() {
        let scope = scope();
        let a = scope.cache_key("https://EXAMPLE.com/app/a.js").unwrap();
        let b = scope.cache_key("a.js").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_resolve_removes_fragment() {
        let scope = scope();
        assert_eq!(scope.cache_key("a.html#top").unwrap(), "https://example.com/app/a.html");
    }

    #[test]
    fn test_resolve_preserves_query() {
        let scope = scope();
        assert_eq!(scope.cache_key("a.js?b=2&a=1").unwrap(), "https://example.com/app/a.js?b=2&a=1");
    }

    #[test]
    fn test_resolve_strips_revision_marker() {
        let scope = scope();
        assert_eq!(scope.cache_key("a.js?__precache_revision=3").unwrap(), "https://example.com/app/a.js");
        assert_eq!(scope.cache_key("a.js?v=1&__precache_revision=3").unwrap(), "https://example.com/app/a.js?v=1");
    }

    #[test]
    fn test_resolve_rejects_other_schemes() {
        let scope = scope();
        assert!(matches!(scope.resolve("data:text/plain,hi"), Err(UrlError::UnsupportedScheme(_))));
        assert!(matches!(scope.resolve("  "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_scope_rejects_file_base() {
        assert!(matches!(Scope::new("file:///srv/app/", "r"), Err(UrlError::UnsupportedScheme(_))));
        assert!(matches!(Scope::new("not a url", "r"), Err(UrlError::InvalidUrl(_))));
    }

    #[test]
    fn test_fetch_target_round_trips_to_key() {
        let scope = scope();
        let url = scope.resolve("a.js?v=1").unwrap();
        let target = scope.fetch_target(&url, "abc 123");
        assert_eq!(target.query(), Some("v=1&__precache_revision=abc+123"));
        assert_eq!(scope.strip_revision_marker(&target), url);
    }

    #[test]
    fn test_same_origin() {
        let scope = scope();
        assert!(scope.is_same_origin(&Url::parse("https://example.com/other").unwrap()));
        assert!(!scope.is_same_origin(&Url::parse("https://cdn.example.net/lib.js").unwrap()));
        assert!(!scope.is_same_origin(&Url::parse("http://example.com/app/a.js").unwrap()));
    }

    #[test]
    fn test_lookup_candidates_ignores_tracking_params() {
        let scope = scope();
        let candidates = scope.lookup_candidates("a.js?utm_source=x&v=2").unwrap();
        assert_eq!(
            candidates,
            vec!["https://example.com/app/a.js?utm_source=x&v=2", "https://example.com/app/a.js?v=2"]
        );
    }

    #[test]
    fn test_lookup_candidates_directory_index() {
        let scope = scope();
        let candidates = scope.lookup_candidates("./").unwrap();
        assert_eq!(candidates, vec!["https://example.com/app/", "https://example.com/app/index.html"]);
    }

    #[test]
    fn test_marker_strip_keeps_percent_encoding() {
        let scope = scope();
        let plain = scope.cache_key("a.js?v=a%20b").unwrap();
        assert_eq!(plain, "https://example.com/app/a.js?v=a%20b");
        assert_eq!(scope.cache_key("a.js?v=a%20b&__precache_revision=1").unwrap(), plain);
        assert_eq!(scope.cache_key("a.js?__precache_revision=1&v=a%20b").unwrap(), plain);
    }

    #[test]
    fn test_marker_strip_keeps_valueless_params() {
        let scope = scope();
        let plain = scope.cache_key("b.js?debug").unwrap();
        assert_eq!(plain, "https://example.com/app/b.js?debug");
        assert_eq!(scope.cache_key("b.js?debug&__precache_revision=1").unwrap(), plain);
        assert_eq!(
            scope.cache_key("b.js?__precache_revision=1&debug&&x").unwrap(),
            "https://example.com/app/b.js?debug&&x"
        );
    }

    #[test]
    fn test_marker_name_matched_decoded() {
        let scope = scope();
        assert_eq!(scope.cache_key("a.js?%5F%5Fprecache_revision=1").unwrap(), "https://example.com/app/a.js");
    }

    #[test]
    fn test_fetch_target_round_trips_encoded_query() {
        let scope = scope();
        let url = scope.resolve("a.js?v=a%20b&debug").unwrap();
        let target = scope.fetch_target(&url, "7");
        assert_eq!(scope.strip_revision_marker(&target), url);
    }

    #[test]
    fn test_lookup_candidates_keep_encoding() {
        let scope = scope();
        let candidates = scope.lookup_candidates("a.js?utm_source=x&v=a%20b").unwrap();
        assert_eq!(candidates[1], "https://example.com/app/a.js?v=a%20b");
    }

    #[test]
    fn test_lookup_candidates_with_revision_marker() {
        let scope = scope();
        let candidates = scope.lookup_candidates("a.js?__precache_revision=9").unwrap();
        assert_eq!(candidates, vec!["https://example.com/app/a.js"]);
    }
}
