//! String key/value preferences with typed helpers.

use crate::{CacheDb, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

pub const THEME_KEY: &str = "theme";
pub const INSTALL_DISMISSED_KEY: &str = "install_prompt_dismissed_at";

/// UI colour theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(Error::InvalidInput(format!("unknown theme: {other}"))),
        }
    }
}

impl CacheDb {
    pub async fn get_preference(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let value = conn
                    .query_row("SELECT value FROM preferences WHERE key = ?1", params![key], |row| row.get(0))
                    .optional()?;
                Ok(value)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn set_preference(&self, key: &str, value: &str) -> Result<(), Error> {
        if key.trim().is_empty() {
            return Err(Error::InvalidInput("preference key cannot be empty".into()));
        }

        let key = key.to_string();
        let value = value.to_string();
        let updated_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, value, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Stored theme; an unknown stored value falls back to the default.
    pub async fn theme(&self) -> Result<Theme, Error> {
        let stored = self.get_preference(THEME_KEY).await?;
        Ok(stored.and_then(|s| s.parse().ok()).unwrap_or_default())
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), Error> {
        self.set_preference(THEME_KEY, theme.as_str()).await
    }

    /// When the user last dismissed the install prompt.
    pub async fn install_prompt_dismissed_at(&self) -> Result<Option<DateTime<Utc>>, Error> {
        let stored = self.get_preference(INSTALL_DISMISSED_KEY).await?;
        Ok(stored
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    pub async fn dismiss_install_prompt(&self, at: DateTime<Utc>) -> Result<(), Error> {
        self.set_preference(INSTALL_DISMISSED_KEY, &at.to_rfc3339()).await
    }
}
