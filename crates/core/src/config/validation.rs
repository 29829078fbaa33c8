//! Configuration validation rules.
//!
//! Checked once after loading from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_version`, `user_agent` or `offline_notice` is empty
    /// - `origin` is not an http(s) URL
    /// - a `manifest` or `api_paths` item is blank
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.trim().is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }

        self.origin_url()?;

        if self.manifest.iter().any(|m| m.trim().is_empty()) {
            return Err(invalid("manifest", "entries must not be blank"));
        }
        if self.api_paths.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid("api_paths", "entries must not be blank"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.offline_notice.trim().is_empty() {
            return Err(invalid("offline_notice", "must not be empty"));
        }

        if self.manifest.is_empty() {
            tracing::warn!("manifest is empty; installs will create an empty generation");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: Result<(), ConfigError>) -> String {
        match result {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_default_config() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_blank_version() {
        let config = AppConfig { cache_version: "  ".into(), ..Default::default() };
        assert_eq!(field_of(config.validate()), "cache_version");
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert_eq!(field_of(config.validate()), "origin");
    }

    #[test]
    fn test_validate_blank_manifest_entry() {
        let config = AppConfig { manifest: vec!["/".into(), "".into()], ..Default::default() };
        assert_eq!(field_of(config.validate()), "manifest");
    }

    #[test]
    fn test_validate_blank_api_path() {
        let config = AppConfig { api_paths: vec![" ".into()], ..Default::default() };
        assert_eq!(field_of(config.validate()), "api_paths");
    }

    #[test]
    fn test_validate_max_bytes_bounds() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        assert_eq!(field_of(config.validate()), "max_bytes");

        let config = AppConfig { max_bytes: 51 * 1024 * 1024, ..Default::default() };
        assert_eq!(field_of(config.validate()), "max_bytes");
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(field_of(config.validate()), "timeout_ms");

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert_eq!(field_of(config.validate()), "timeout_ms");
    }

    #[test]
    fn test_validate_empty_notice() {
        let config = AppConfig { offline_notice: String::new(), ..Default::default() };
        assert_eq!(field_of(config.validate()), "offline_notice");
    }

    #[test]
    fn test_validate_edge_values() {
        let config = AppConfig {
            max_bytes: 50 * 1024 * 1024,
            timeout_ms: 100,
            manifest: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
