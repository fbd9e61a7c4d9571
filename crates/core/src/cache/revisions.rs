//! Revision store backed by the `revisions` table.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::{Namespace, RevisionStore};
use crate::Error;

#[async_trait]
impl RevisionStore for Namespace {
    async fn revision(&self, key: &str) -> Result<Option<String>, Error> {
        let (name, key) = (self.name.clone(), key.to_string());
        self.db
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT revision FROM revisions WHERE namespace = ?1 AND cache_key = ?2",
                    params![name, key],
                    |row| row.get(0),
                );

                match result {
                    Ok(rev) => Ok(Some(rev)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn set_revision(&self, key: &str, revision: &str) -> Result<(), Error> {
        let (name, key, revision) = (self.name.clone(), key.to_string(), revision.to_string());
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO revisions (namespace, cache_key, revision, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(namespace, cache_key) DO UPDATE SET
                        revision = excluded.revision,
                        updated_at = excluded.updated_at",
                    params![name, key, revision, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_revision(&self, key: &str) -> Result<(), Error> {
        let (name, key) = (self.name.clone(), key.to_string());
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM revisions WHERE namespace = ?1 AND cache_key = ?2", params![name, key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn revision_keys(&self) -> Result<BTreeSet<String>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<BTreeSet<String>, Error> {
                let mut stmt = conn.prepare("SELECT cache_key FROM revisions WHERE namespace = ?1")?;
                let keys = stmt
                    .query_map(params![name], |row| row.get(0))?
                    .collect::<Result<BTreeSet<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}
