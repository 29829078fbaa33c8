//! Cache generation lifecycle.
//!
//! A generation moves `populating -> installed -> current`. Only an installed
//! generation can be promoted, and promotion deletes every other generation
//! in the same transaction. Entries are never removed one by one; a
//! generation is dropped as a whole.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// Lifecycle state of a stored generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    /// Install is writing the manifest; not eligible for promotion.
    Populating,
    /// Manifest fully written; waiting for activation.
    Installed,
    /// The one generation requests are served from.
    Current,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Populating => "populating",
            Self::Installed => "installed",
            Self::Current => "current",
        }
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "populating" => Ok(Self::Populating),
            "installed" => Ok(Self::Installed),
            "current" => Ok(Self::Current),
            other => Err(Error::CacheCorrupt(format!("unknown generation state: {other}"))),
        }
    }
}

/// Summary row for a stored generation.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub state: GenerationState,
    pub created_at: String,
    pub promoted_at: Option<String>,
    pub entry_count: u64,
}

/// Handle to one named generation.
///
/// Holding a handle does not imply the generation exists; reads against a
/// missing generation return nothing and writes fail on the foreign key.
#[derive(Clone, Debug)]
pub struct Generation {
    pub(crate) db: CacheDb,
    pub(crate) name: String,
}

impl CacheDb {
    /// Get a handle to a generation without touching the database.
    pub fn generation(&self, name: &str) -> Generation {
        Generation { db: self.clone(), name: name.to_string() }
    }

    /// Create the generation, or reset it to an empty `populating` one for
    /// a fresh install. A generation that is already current is left as is.
    pub async fn begin_generation(&self, name: &str) -> Result<Generation, Error> {
        let owned = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM entries WHERE generation = ?1
                    AND EXISTS (SELECT 1 FROM generations WHERE name = ?1 AND state != 'current')",
                    params![owned],
                )?;
                tx.execute(
                    "INSERT INTO generations (name, state, created_at) VALUES (?1, 'populating', ?2)
                    ON CONFLICT(name) DO UPDATE SET state = 'populating', created_at = excluded.created_at
                    WHERE generations.state != 'current'",
                    params![owned, now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(self.generation(name))
    }

    /// The generation currently being served from, if any.
    pub async fn current_generation(&self) -> Result<Option<Generation>, Error> {
        let name = self
            .conn
            .call(|conn| -> Result<Option<String>, Error> {
                let name = conn
                    .query_row("SELECT name FROM generations WHERE state = 'current' LIMIT 1", [], |row| {
                        row.get(0)
                    })
                    .optional()?;
                Ok(name)
            })
            .await
            .map_err(Error::from)?;

        Ok(name.map(|name| self.generation(&name)))
    }

    /// List every stored generation with its entry count.
    pub async fn list_generations(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.state, g.created_at, g.promoted_at, COUNT(e.key)
                    FROM generations g LEFT JOIN entries e ON e.generation = g.name
                    GROUP BY g.name ORDER BY g.created_at ASC, g.name ASC",
                )?;

                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, Option<String>>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(name, state, created_at, promoted_at, count)| {
                        Ok(GenerationInfo {
                            name,
                            state: state.parse()?,
                            created_at,
                            promoted_at,
                            entry_count: count as u64,
                        })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all of its entries.
    ///
    /// Returns false if no generation had that name.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

impl Generation {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored state, or None if the generation does not exist.
    pub async fn state(&self) -> Result<Option<GenerationState>, Error> {
        let name = self.name.clone();
        let state = self
            .db
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let state = conn
                    .query_row("SELECT state FROM generations WHERE name = ?1", params![name], |row| row.get(0))
                    .optional()?;
                Ok(state)
            })
            .await
            .map_err(Error::from)?;

        state.map(|s| s.parse()).transpose()
    }

    /// Mark the manifest as fully written.
    pub async fn mark_installed(&self) -> Result<(), Error> {
        let name = self.name.clone();
        let updated = self
            .db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                Ok(conn.execute(
                    "UPDATE generations SET state = 'installed' WHERE name = ?1 AND state = 'populating'",
                    params![name],
                )?)
            })
            .await
            .map_err(Error::from)?;

        if updated == 0 {
            return Err(Error::GenerationNotReady(format!("{} is not being populated", self.name)));
        }
        Ok(())
    }

    /// Make this the current generation and delete every other one.
    ///
    /// Fails without changing anything unless this generation is installed
    /// (or already current). Returns the names of the purged generations.
    pub async fn promote(&self) -> Result<Vec<String>, Error> {
        let name = self.name.clone();
        let now = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.transaction()?;

                let state: Option<String> = tx
                    .query_row("SELECT state FROM generations WHERE name = ?1", params![name], |row| row.get(0))
                    .optional()?;

                match state.as_deref() {
                    Some("installed") => {
                        tx.execute(
                            "UPDATE generations SET state = 'current', promoted_at = ?2 WHERE name = ?1",
                            params![name, now],
                        )?;
                    }
                    Some("current") => {}
                    Some(other) => return Err(Error::GenerationNotReady(format!("{name} is {other}"))),
                    None => return Err(Error::GenerationNotReady(format!("{name} does not exist"))),
                }

                let stale = {
                    let mut stmt = tx.prepare("SELECT name FROM generations WHERE name != ?1 ORDER BY name")?;
                    stmt.query_map(params![name], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, _>>()?
                };

                tx.execute("DELETE FROM generations WHERE name != ?1", params![name])?;
                tx.commit()?;

                Ok(stale)
            })
            .await
            .map_err(Error::from)
    }
}
