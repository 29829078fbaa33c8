//! Entry reads and writes within a generation.
//!
//! Writes are UPSERTs keyed by request identity, so concurrent writers to the
//! same key resolve as last-writer-wins. Each write is its own statement; no
//! transaction spans several entries.

use super::generations::Generation;
use super::hash::compute_cache_key;
use crate::{Error, ResponseSnapshot};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// A stored entry with its request identity.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheEntry {
    pub key: String,
    pub method: String,
    pub url: String,
    pub response: ResponseSnapshot,
    pub stored_at: String,
}

fn decode_headers(json: &str) -> Result<Vec<(String, String)>, Error> {
    serde_json::from_str(json).map_err(|e| Error::CacheCorrupt(format!("bad headers_json: {e}")))
}

impl Generation {
    /// Insert or overwrite the entry for `method url`.
    pub async fn put(&self, method: &str, url: &str, response: &ResponseSnapshot) -> Result<(), Error> {
        let generation = self.name.clone();
        let key = compute_cache_key(method, url);
        let method = method.to_ascii_uppercase();
        let url = url.to_string();
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("unserializable headers: {e}")))?;
        let status = response.status;
        let body = response.body.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (generation, key, method, url, status, headers_json, body, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(generation, key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![generation, key, method, url, status, headers_json, body, stored_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for `method url`.
    ///
    /// Returns None if there is no entry (or no generation).
    pub async fn get(&self, method: &str, url: &str) -> Result<Option<ResponseSnapshot>, Error> {
        let generation = self.name.clone();
        let key = compute_cache_key(method, url);

        let row = self
            .db
            .conn
            .call(move |conn| -> Result<Option<(u16, String, Vec<u8>)>, Error> {
                let row = conn
                    .query_row(
                        "SELECT status, headers_json, body FROM entries WHERE generation = ?1 AND key = ?2",
                        params![generation, key],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?;

        row.map(|(status, headers_json, body)| {
            Ok(ResponseSnapshot { status, headers: decode_headers(&headers_json)?, body })
        })
        .transpose()
    }

    /// Number of entries stored in this generation.
    pub async fn entry_count(&self) -> Result<u64, Error> {
        let generation = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// All entries in this generation, ordered by URL.
    pub async fn entries(&self) -> Result<Vec<CacheEntry>, Error> {
        let generation = self.name.clone();
        let rows = self
            .db
            .conn
            .call(move |conn| -> Result<Vec<(String, String, String, u16, String, Vec<u8>, String)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, method, url, status, headers_json, body, stored_at
                    FROM entries WHERE generation = ?1 ORDER BY url ASC, method ASC",
                )?;
                let rows = stmt
                    .query_map(params![generation], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(key, method, url, status, headers_json, body, stored_at)| {
                Ok(CacheEntry {
                    key,
                    method,
                    url,
                    response: ResponseSnapshot { status, headers: decode_headers(&headers_json)?, body },
                    stored_at,
                })
            })
            .collect()
    }
}
