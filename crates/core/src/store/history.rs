//! Capped, de-duplicated lookup history.

use crate::{CacheDb, Error, SpeciesResult};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Maximum number of remembered lookups.
pub const MAX_HISTORY: usize = 20;

/// One remembered lookup, newest first when listed.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HistoryEntry {
    pub name: String,
    pub scientific_name: String,
    pub result: SpeciesResult,
    pub recorded_at: String,
}

impl CacheDb {
    /// Remember a lookup result.
    ///
    /// A result with the same name and scientific name replaces the old
    /// entry and moves to the front; the list is then trimmed to
    /// [`MAX_HISTORY`].
    pub async fn record_history(&self, result: &SpeciesResult) -> Result<(), Error> {
        let name = result.name.clone();
        let scientific_name = result.scientific_name.clone();
        let result_json = serde_json::to_string(result)
            .map_err(|e| Error::InvalidInput(format!("unserializable result: {e}")))?;
        let recorded_at = chrono::Utc::now().to_rfc3339();
        let keep = MAX_HISTORY as i64;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO history (name, scientific_name, result_json, recorded_at, seq)
                    VALUES (?1, ?2, ?3, ?4, (SELECT COALESCE(MAX(seq), 0) + 1 FROM history))
                    ON CONFLICT(name, scientific_name) DO UPDATE SET
                        result_json = excluded.result_json,
                        recorded_at = excluded.recorded_at,
                        seq = excluded.seq",
                    params![name, scientific_name, result_json, recorded_at],
                )?;
                tx.execute(
                    "DELETE FROM history WHERE rowid IN (
                        SELECT rowid FROM history ORDER BY seq DESC LIMIT -1 OFFSET ?1
                    )",
                    params![keep],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All remembered lookups, newest first.
    pub async fn list_history(&self) -> Result<Vec<HistoryEntry>, Error> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<(String, String, String, String)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT name, scientific_name, result_json, recorded_at FROM history ORDER BY seq DESC",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(name, scientific_name, result_json, recorded_at)| {
                let result = serde_json::from_str(&result_json)
                    .map_err(|e| Error::CacheCorrupt(format!("history entry {name}: {e}")))?;
                Ok(HistoryEntry { name, scientific_name, result, recorded_at })
            })
            .collect()
    }

    /// Forget every lookup. Returns the number removed.
    pub async fn clear_history(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> { Ok(conn.execute("DELETE FROM history", [])? as u64) })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DangerLevel;

    fn species(name: &str, scientific: &str, points: u32) -> SpeciesResult {
        SpeciesResult {
            name: name.to_string(),
            scientific_name: scientific.to_string(),
            description: String::new(),
            habitat: "Chile central".to_string(),
            curiosity: String::new(),
            danger: DangerLevel::Low,
            points,
            image_url: None,
            regions: Vec::new(),
            sound: None,
        }
    }

    #[tokio::test]
    async fn test_record_and_list_newest_first() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.record_history(&species("Chinita", "Eriopis connexa", 30)).await.unwrap();
        db.record_history(&species("Copihue", "Lapageria rosea", 60)).await.unwrap();

        let history = db.list_history().await.unwrap();
        let names: Vec<_> = history.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Copihue", "Chinita"]);
    }

    #[tokio::test]
    async fn test_duplicate_does_not_grow() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.record_history(&species("Chinita", "Eriopis connexa", 30)).await.unwrap();
        db.record_history(&species("Copihue", "Lapageria rosea", 60)).await.unwrap();
        db.record_history(&species("Chinita", "Eriopis connexa", 45)).await.unwrap();

        let history = db.list_history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].name, "Chinita");
        assert_eq!(history[0].result.points, 45);
    }

    #[tokio::test]
    async fn test_same_name_different_scientific_name_is_distinct() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.record_history(&species("Abeja", "Apis mellifera", 20)).await.unwrap();
        db.record_history(&species("Abeja", "Bombus dahlbomii", 90)).await.unwrap();

        assert_eq!(db.list_history().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_capped_at_max() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for i in 0..(MAX_HISTORY + 5) {
            db.record_history(&species(&format!("Especie {i}"), &format!("Genus {i}"), 10))
                .await
                .unwrap();
        }

        let history = db.list_history().await.unwrap();
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history[0].name, format!("Especie {}", MAX_HISTORY + 4));
        assert_eq!(history[MAX_HISTORY - 1].name, "Especie 5");
    }

    #[tokio::test]
    async fn test_clear_history() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.record_history(&species("Chinita", "Eriopis connexa", 30)).await.unwrap();

        assert_eq!(db.clear_history().await.unwrap(), 1);
        assert!(db.list_history().await.unwrap().is_empty());
    }
}
