//! Response cache backed by the `responses` table.
//!
//! Stored responses are always the final response of a fetch: redirects are
//! resolved before anything reaches this module.

use std::collections::BTreeSet;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::{Namespace, ResponseCache};
use crate::Error;

/// A cached HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CachedResponse {
    pub status: u16,
    /// Header pairs; names are stored lowercased.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// URL the body was actually served from, after redirects.
    pub final_url: String,
    /// Cross-origin response whose body callers may not introspect.
    pub opaque: bool,
    pub fetched_at: String,
}

impl CachedResponse {
    pub fn new(status: u16, final_url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
            final_url: final_url.into(),
            opaque: false,
            fetched_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_opaque(mut self, opaque: bool) -> Self {
        self.opaque = opaque;
        self
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body as text, or `None` for opaque or non UTF-8 bodies.
    pub fn text(&self) -> Option<&str> {
        if self.opaque {
            return None;
        }
        std::str::from_utf8(&self.body).ok()
    }
}

#[async_trait]
impl ResponseCache for Namespace {
    async fn has_response(&self, key: &str) -> Result<bool, Error> {
        let (name, key) = (self.name.clone(), key.to_string());
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM responses WHERE namespace = ?1 AND cache_key = ?2)",
                    params![name, key],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn response(&self, key: &str) -> Result<Option<CachedResponse>, Error> {
        let (name, key) = (self.name.clone(), key.to_string());
        self.db
            .conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let result = conn.query_row(
                    "SELECT status, headers_json, body, final_url, opaque, fetched_at
                     FROM responses WHERE namespace = ?1 AND cache_key = ?2",
                    params![name, key],
                    |row| {
                        Ok((
                            row.get::<_, u16>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Vec<u8>>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, i32>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    },
                );

                let (status, headers_json, body, final_url, opaque, fetched_at) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                Ok(Some(CachedResponse {
                    status,
                    headers: serde_json::from_str(&headers_json)?,
                    body,
                    final_url,
                    opaque: opaque == 1,
                    fetched_at,
                }))
            })
            .await
            .map_err(Error::from)
    }

    async fn put_response(&self, key: &str, response: &CachedResponse) -> Result<(), Error> {
        let (name, key) = (self.name.clone(), key.to_string());
        let headers_json = serde_json::to_string(&response.headers)?;
        let response = response.clone();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO responses (
                        namespace, cache_key, status, headers_json, body, final_url, opaque, fetched_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(namespace, cache_key) DO UPDATE SET
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        final_url = excluded.final_url,
                        opaque = excluded.opaque,
                        fetched_at = excluded.fetched_at",
                    params![
                        name,
                        key,
                        response.status,
                        headers_json,
                        response.body,
                        response.final_url,
                        response.opaque as i32,
                        response.fetched_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_response(&self, key: &str) -> Result<(), Error> {
        let (name, key) = (self.name.clone(), key.to_string());
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM responses WHERE namespace = ?1 AND cache_key = ?2", params![name, key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn response_keys(&self) -> Result<BTreeSet<String>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<BTreeSet<String>, Error> {
                let mut stmt = conn.prepare("SELECT cache_key FROM responses WHERE namespace = ?1")?;
                let keys = stmt
                    .query_map(params![name], |row| row.get(0))?
                    .collect::<Result<BTreeSet<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}
