//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 100MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_concurrency` is 0 or exceeds 64
    /// - `max_redirects` exceeds 20
    /// - `user_agent`, `namespace_prefix` or `revision_param` is empty
    /// - `scope_url` is not an absolute http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 100 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 100MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_concurrency == 0 {
            return Err(invalid("max_concurrency", "must be at least 1"));
        }
        if self.max_concurrency > 64 {
            return Err(invalid("max_concurrency", "must not exceed 64"));
        }

        if self.max_redirects > 20 {
            return Err(invalid("max_redirects", "must not exceed 20"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.namespace_prefix.is_empty() {
            return Err(invalid("namespace_prefix", "must not be empty"));
        }
        if self.revision_param.is_empty() {
            return Err(invalid("revision_param", "must not be empty"));
        }

        let scope = url::Url::parse(&self.scope_url).map_err(|e| invalid("scope_url", &e.to_string()))?;
        if !matches!(scope.scheme(), "http" | "https") {
            return Err(invalid("scope_url", "must use http or https"));
        }

        if self.ignore_url_parameters.iter().any(|p| p.is_empty()) {
            tracing::warn!("empty prefix in ignore_url_parameters ignores every query parameter on lookup");
        }

        Ok(())
    }
}
