//! Unified error types for precache.
//!
//! Every error carries a stable code prefix in its display string so that
//! callers (and the MCP surface) can classify failures without matching on
//! message text.

use std::sync::Arc;

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

use crate::manifest::ManifestError;

/// Broad failure class, used to decide how a pass reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed manifest input. Nothing was touched.
    Manifest,
    /// Network failure or unusable response for one identifier.
    Fetch,
    /// The durable store failed; the unconfirmed write did not happen.
    Storage,
    /// Everything else (bad arguments, lookups, pass exclusion).
    Other,
}

/// Why a single identifier could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchErrorKind {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("status {0}")]
    Status(u16),

    #[error("redirect without a usable Location header")]
    MissingLocation,

    #[error("more than {0} redirects")]
    TooManyRedirects(usize),

    #[error("{0} bytes exceeds limit")]
    TooLarge(usize),

    #[error("invalid redirect target: {0}")]
    InvalidRedirect(String),
}

/// A fetch failure tagged with the cache key it was fetching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{identifier}: {kind}")]
pub struct FetchError {
    pub identifier: String,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(identifier: impl Into<String>, kind: FetchErrorKind) -> Self {
        Self { identifier: identifier.into(), kind }
    }
}

/// Unified error type for precache.
///
/// Cloneable so that one coalesced fetch outcome can be handed to every
/// requester of the same identifier.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Manifest could not be normalized.
    #[error("MANIFEST_ERROR: {0}")]
    Manifest(#[from] ManifestError),

    /// A network fetch failed for one identifier.
    #[error("FETCH_ERROR: {0}")]
    Fetch(#[from] FetchError),

    /// Database operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Database(Arc<tokio_rusqlite::Error>),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A persisted value could not be encoded or decoded.
    #[error("STORAGE_ERROR: corrupt record: {0}")]
    Corrupt(String),

    /// URL could not be parsed or resolved against the scope.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Nothing is precached under the given identifier.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Another pass is already running against the namespace.
    #[error("PASS_IN_PROGRESS: {0}")]
    PassInProgress(String),

    /// A worker task died before reporting an outcome.
    #[error("INTERNAL_ERROR: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Manifest(_) => ErrorKind::Manifest,
            Error::Fetch(_) => ErrorKind::Fetch,
            Error::Database(_) | Error::MigrationFailed(_) | Error::Corrupt(_) => ErrorKind::Storage,
            Error::InvalidInput(_)
            | Error::InvalidUrl(_)
            | Error::CacheMiss(_)
            | Error::PassInProgress(_)
            | Error::Internal(_) => ErrorKind::Other,
        }
    }

    pub fn is_storage(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }

    fn database(err: tokio_rusqlite::Error) -> Self {
        Error::Database(Arc::new(err))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::database(tokio_rusqlite::Error::Close(c)),
            _ => Error::database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Corrupt(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::Manifest(_) => -32602,
            Error::Fetch(_) => -32008,
            Error::Database(_) | Error::MigrationFailed(_) | Error::Corrupt(_) => -32002,
            Error::InvalidUrl(_) => -32003,
            Error::CacheMiss(_) => -32001,
            Error::PassInProgress(_) => -32013,
            Error::Internal(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CacheMiss("https://example.com/a.js".to_string());
        assert!(err.to_string().contains("CACHE_MISS"));
        assert!(err.to_string().contains("a.js"));
    }

    #[test]
    fn test_fetch_error_display_names_identifier() {
        let err: Error = FetchError::new("https://example.com/a.js", FetchErrorKind::Status(404)).into();
        let msg = err.to_string();
        assert!(msg.starts_with("FETCH_ERROR"));
        assert!(msg.contains("https://example.com/a.js"));
        assert!(msg.contains("404"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::from(ManifestError::MissingIdentifier { index: 0 }).kind(), ErrorKind::Manifest);
        assert_eq!(Error::MigrationFailed("x".into()).kind(), ErrorKind::Storage);
        assert!(Error::from(rusqlite::Error::QueryReturnedNoRows).is_storage());
        assert_eq!(Error::PassInProgress("ns".into()).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_error_is_clone() {
        let err = Error::from(rusqlite::Error::QueryReturnedNoRows);
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::CacheMiss("abc".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32001);

        let err: Error = FetchError::new("a", FetchErrorKind::Timeout).into();
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32008);
    }
}
