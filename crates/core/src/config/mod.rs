//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (NATURIA_*)
//! 2. TOML config file (if NATURIA_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (NATURIA_*)
/// 2. TOML config file (if NATURIA_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding cache generations and the local store.
    ///
    /// Set via NATURIA_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Name of the cache generation this build installs and serves from.
    ///
    /// Set via NATURIA_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin the application is served from; relative URLs resolve against it.
    ///
    /// Set via NATURIA_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Resources written into a new generation at install.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Path fragments that mark a request as an API call.
    #[serde(default = "default_api_paths")]
    pub api_paths: Vec<String>,

    /// User-Agent string for outgoing requests.
    ///
    /// Set via NATURIA_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body bytes accepted from the network.
    ///
    /// Set via NATURIA_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Connect timeout in milliseconds.
    ///
    /// Set via NATURIA_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Activate a freshly installed version without waiting for a
    /// `SKIP_WAITING` message.
    ///
    /// Set via NATURIA_SKIP_WAITING environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Notice placed in the `error` field of the offline API response.
    #[serde(default = "default_offline_notice")]
    pub offline_notice: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./naturia-cache.sqlite")
}

fn default_cache_version() -> String {
    "naturia-chile-v1".into()
}

fn default_origin() -> String {
    "http://localhost:5000".into()
}

fn default_manifest() -> Vec<String> {
    vec![
        "/".into(),
        "/static/css/styles.css".into(),
        "/static/js/app.js".into(),
        "/static/manifest.json".into(),
        "https://fonts.googleapis.com/css2?family=Nunito:wght@400;600;700;800&display=swap".into(),
    ]
}

fn default_api_paths() -> Vec<String> {
    vec!["/analizar".into(), "/buscar".into()]
}

fn default_user_agent() -> String {
    "naturia-sw/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

fn default_offline_notice() -> String {
    "📵 Sin conexión. Por favor, verifica tu internet e intenta de nuevo.".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            manifest: default_manifest(),
            api_paths: default_api_paths(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            skip_waiting: true,
            offline_notice: default_offline_notice(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {other}") }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The layered provider stack used by [`AppConfig::load`].
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("NATURIA_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("NATURIA_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    /// Extract and validate a config from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./naturia-cache.sqlite"));
        assert_eq!(config.cache_version, "naturia-chile-v1");
        assert_eq!(config.manifest.len(), 5);
        assert_eq!(config.manifest[0], "/");
        assert_eq!(config.api_paths, vec!["/analizar", "/buscar"]);
        assert_eq!(config.max_bytes, 5_242_880);
        assert!(config.skip_waiting);
        assert!(config.offline_notice.contains("Sin conexión"));
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_origin_url() {
        let config = AppConfig::default();
        assert_eq!(config.origin_url().unwrap().as_str(), "http://localhost:5000/");

        let config = AppConfig { origin: "ftp://files.test".into(), ..Default::default() };
        assert!(matches!(config.origin_url(), Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_env_overrides_file_and_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "naturia.toml",
                r#"
                cache_version = "from-file"
                origin = "https://naturia.test"
                api_paths = ["/analizar"]
                "#,
            )?;
            jail.set_env("NATURIA_CONFIG_FILE", "naturia.toml");
            jail.set_env("NATURIA_CACHE_VERSION", "from-env");
            jail.set_env("NATURIA_SKIP_WAITING", "false");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_version, "from-env");
            assert_eq!(config.origin, "https://naturia.test");
            assert_eq!(config.api_paths, vec!["/analizar"]);
            assert!(!config.skip_waiting);
            assert_eq!(config.user_agent, "naturia-sw/0.1");
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("NATURIA_TIMEOUT_MS", "5");
            assert!(matches!(AppConfig::load(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
            Ok(())
        });
    }
}
