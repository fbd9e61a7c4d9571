//! Manifest normalization.
//!
//! A raw manifest is a list whose items are either a bare identifier string
//! or a `{url, revision}` object. Normalization resolves that union once,
//! fills in default revisions and drops duplicate identifiers so that the
//! synchronizer only ever sees canonical entries.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Errors raised while normalizing a raw manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("entry {index} has no url")]
    MissingIdentifier { index: usize },

    #[error("entry {index} has an empty url")]
    EmptyIdentifier { index: usize },

    #[error("entry {index} ({identifier}) has an empty revision")]
    EmptyRevision { index: usize, identifier: String },

    #[error("{identifier} cannot be resolved: {reason}")]
    Unresolvable { identifier: String, reason: String },
}

/// One item of a raw manifest, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawEntry {
    /// Bare identifier; its revision is the identifier itself.
    Url(String),
    /// Identifier with an optional explicit revision.
    Revisioned {
        #[serde(default, alias = "identifier")]
        url: Option<String>,
        #[serde(default)]
        revision: Option<String>,
    },
}

impl RawEntry {
    pub fn revisioned(url: impl Into<String>, revision: impl Into<String>) -> Self {
        RawEntry::Revisioned { url: Some(url.into()), revision: Some(revision.into()) }
    }
}

impl From<&str> for RawEntry {
    fn from(url: &str) -> Self {
        RawEntry::Url(url.to_string())
    }
}

/// A canonical manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub identifier: String,
    pub revision: String,
}

/// Normalize a raw manifest.
///
/// Identifiers are deduplicated by exact string, first occurrence wins, and
/// the order of surviving entries is preserved.
pub fn normalize(raw: &[RawEntry]) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut entries = Vec::with_capacity(raw.len());

    for (index, item) in raw.iter().enumerate() {
        let entry = normalize_entry(index, item)?;
        if seen.insert(entry.identifier.clone()) {
            entries.push(entry);
        } else {
            tracing::debug!(identifier = %entry.identifier, index, "dropping duplicate manifest entry");
        }
    }

    Ok(entries)
}

fn normalize_entry(index: usize, item: &RawEntry) -> Result<ManifestEntry, ManifestError> {
    let (identifier, revision) = match item {
        RawEntry::Url(url) => (url.trim(), None),
        RawEntry::Revisioned { url, revision } => {
            let url = url.as_deref().ok_or(ManifestError::MissingIdentifier { index })?;
            (url.trim(), revision.as_deref())
        }
    };

    if identifier.is_empty() {
        return Err(ManifestError::EmptyIdentifier { index });
    }

    let revision = match revision {
        Some(rev) if rev.is_empty() => {
            return Err(ManifestError::EmptyRevision { index, identifier: identifier.to_string() });
        }
        Some(rev) => rev.to_string(),
        None => identifier.to_string(),
    };

    Ok(ManifestEntry { identifier: identifier.to_string(), revision })
}
