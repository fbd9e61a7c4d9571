//! Network layer for precaching.
//!
//! The synchronizer only needs "issue a request, receive a response" from
//! the network, so that is all the [`Network`] trait exposes. The production
//! implementation is [`HttpNetwork`] on top of reqwest:
//!
//! - Redirects are followed transparently (max: 5, configurable)
//! - Max body bytes: 10MB (configurable)
//! - Non-success statuses are returned, not raised; the executor decides

#[cfg(test)]
pub(crate) mod mock;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

use precache_core::{AppConfig, Error, FetchErrorKind};

pub use self::url::{Scope, UrlError};

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "precache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "precache/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// A response as seen by the precacher.
#[derive(Debug, Clone)]
pub struct NetworkResponse {
    /// URL that produced this response (after any transparent redirects)
    pub url: ::url::Url,
    /// HTTP status code
    pub status: u16,
    /// Response headers, names lowercased
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Bytes,
}

impl NetworkResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues one request and returns its response.
///
/// Implementations may follow redirects themselves; if they surface a 3xx
/// instead, the caller follows the `Location` header.
#[async_trait]
pub trait Network: Send + Sync {
    async fn request(&self, target: &::url::Url) -> Result<NetworkResponse, FetchErrorKind>;
}

/// reqwest-backed network.
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a new network client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::InvalidInput(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn map_error(&self, err: reqwest::Error) -> FetchErrorKind {
        if err.is_timeout() {
            FetchErrorKind::Timeout
        } else if err.is_redirect() {
            FetchErrorKind::TooManyRedirects(self.config.max_redirects)
        } else {
            FetchErrorKind::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn request(&self, target: &::url::Url) -> Result<NetworkResponse, FetchErrorKind> {
        let start = Instant::now();

        let response = self
            .http
            .get(target.as_str())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchErrorKind::TooLarge(len as usize));
        }

        let url = response.url().clone();
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        if body.len() > self.config.max_bytes {
            return Err(FetchErrorKind::TooLarge(body.len()));
        }

        tracing::debug!(
            "fetched {} -> {} ({}) in {}ms ({} bytes)",
            target,
            url,
            status,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(NetworkResponse { url, status, headers, body })
    }
}

fn collect_headers(headers: &header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}
