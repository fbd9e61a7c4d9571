//! Core types and durable state for precache.
//!
//! This crate provides:
//! - Manifest normalization
//! - Revision store and response cache with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;

pub use cache::{CacheDb, CachedResponse, Namespace, NamespaceStats, ResponseCache, RevisionStore};
pub use config::{AppConfig, ConfigError, RevisionMode};
pub use error::{Error, ErrorKind, FetchError, FetchErrorKind};
pub use manifest::{ManifestEntry, ManifestError, RawEntry};
