//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PRECACHE_*)
//! 2. TOML config file (if PRECACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// How the synchronizer decides whether a cached entry is current.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionMode {
    /// The declared revision is compared against the recorded one.
    #[default]
    Revisioned,
    /// Declared revisions are ignored; anything cached is current.
    Unrevisioned,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PRECACHE_*)
/// 2. TOML config file (if PRECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite store holding revisions and responses.
    ///
    /// Set via PRECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base URL that relative manifest identifiers resolve against.
    ///
    /// Set via PRECACHE_SCOPE_URL environment variable.
    #[serde(default = "default_scope_url")]
    pub scope_url: String,

    /// Prefix of the cache namespace name.
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PRECACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum redirect chain length.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Concurrent fetches within one pass.
    ///
    /// Set via PRECACHE_MAX_CONCURRENCY environment variable.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Append the revision marker to fetch targets.
    #[serde(default = "default_true")]
    pub cache_bust: bool,

    /// Query parameter carrying the revision marker.
    #[serde(default = "default_revision_param")]
    pub revision_param: String,

    /// Query parameter name prefixes ignored when looking up a response.
    #[serde(default = "default_ignore_url_parameters")]
    pub ignore_url_parameters: Vec<String>,

    /// File name tried for lookups of directory URLs.
    #[serde(default = "default_directory_index")]
    pub directory_index: Option<String>,

    /// Staleness policy used when diffing a manifest.
    #[serde(default)]
    pub revision_mode: RevisionMode,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./precache.sqlite")
}

fn default_scope_url() -> String {
    "http://localhost/".into()
}

fn default_namespace_prefix() -> String {
    "precache-revisioned".into()
}

fn default_user_agent() -> String {
    "precache/0.1".into()
}

fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_revision_param() -> String {
    "__precache_revision".into()
}

fn default_ignore_url_parameters() -> Vec<String> {
    vec!["utm_".into()]
}

fn default_directory_index() -> Option<String> {
    Some("index.html".into())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            scope_url: default_scope_url(),
            namespace_prefix: default_namespace_prefix(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            max_concurrency: default_max_concurrency(),
            cache_bust: true,
            revision_param: default_revision_param(),
            ignore_url_parameters: default_ignore_url_parameters(),
            directory_index: default_directory_index(),
            revision_mode: RevisionMode::Revisioned,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PRECACHE_`
    /// 2. TOML file from `PRECACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PRECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PRECACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
