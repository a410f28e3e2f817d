//! Sync configuration for client apps.
//!
//! Provides a unified `SyncConfig` used by every client to locate the remote
//! service and tune the background sync loop and retry behavior. Values come
//! from a JSON file, environment variables, or both (environment wins).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::RetryPolicy;
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_REMOTE_URL: &str = "PALS_REMOTE_URL";
pub const ENV_API_KEY: &str = "PALS_API_KEY";
pub const ENV_SYNC_INTERVAL_SECS: &str = "PALS_SYNC_INTERVAL_SECS";

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
const DEFAULT_RETRY_CEILING: u32 = 3;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Remote endpoint and sync tuning.
///
/// The API key is the backend's public anonymous key; nothing secret belongs
/// here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Failed cycles after which a queued mutation is dropped
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            api_key: None,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_ceiling: DEFAULT_RETRY_CEILING,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    /// Create a configuration pointing at the given remote
    pub fn new(remote_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            remote_url: Some(remote_url.into()),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Set the background sync interval
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval_secs = interval.as_secs();
        self
    }

    /// Check if a remote is configured
    pub const fn is_configured(&self) -> bool {
        self.remote_url.is_some() && self.api_key.is_some()
    }

    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Retry policy applied to each remote call during upload
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    /// Load a configuration file, falling back to defaults when it is absent
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let mut config = serde_json::from_str::<Self>(&raw)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the process environment
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup (environment-shaped)
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = normalize_text_option(lookup(ENV_REMOTE_URL)) {
            self.remote_url = Some(url);
        }
        if let Some(key) = normalize_text_option(lookup(ENV_API_KEY)) {
            self.api_key = Some(key);
        }
        match normalize_text_option(lookup(ENV_SYNC_INTERVAL_SECS)).map(|raw| raw.parse::<u64>()) {
            Some(Ok(secs)) => self.sync_interval_secs = secs,
            Some(Err(error)) => {
                tracing::warn!("Ignoring invalid {ENV_SYNC_INTERVAL_SECS}: {error}");
            }
            None => {}
        }
        self.normalize();
        self
    }

    /// Reject values the sync engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.remote_url {
            if !is_http_url(url) {
                return Err(Error::Validation(
                    "remote_url must include http:// or https://".to_string(),
                ));
            }
        }
        if self.sync_interval_secs == 0 {
            return Err(Error::Validation(
                "sync_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.retry_max_attempts == 0 || self.retry_ceiling == 0 {
            return Err(Error::Validation(
                "retry_max_attempts and retry_ceiling must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.remote_url = normalize_text_option(self.remote_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.api_key = normalize_text_option(self.api_key.take());
    }
}

const fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

const fn default_retry_max_attempts() -> u32 {
    DEFAULT_RETRY_MAX_ATTEMPTS
}

const fn default_retry_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}

const fn default_retry_ceiling() -> u32 {
    DEFAULT_RETRY_CEILING
}

const fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_match_sync_contract() {
        let config = SyncConfig::default();
        assert_eq!(config.sync_interval(), Duration::from_secs(300));
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.retry_ceiling, 3);
        assert!(!config.is_configured());
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let error = serde_json::from_str::<SyncConfig>(r#"{"remote_url":"https://x","bogus":1}"#)
            .unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn overrides_take_precedence_and_normalize() {
        let env = HashMap::from([
            (ENV_REMOTE_URL, " https://project.example.co/ "),
            (ENV_API_KEY, "anon"),
            (ENV_SYNC_INTERVAL_SECS, "60"),
        ]);
        let config = SyncConfig::new("https://old.example.co", "old")
            .with_overrides(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.remote_url.as_deref(), Some("https://project.example.co"));
        assert_eq!(config.api_key.as_deref(), Some("anon"));
        assert_eq!(config.sync_interval(), Duration::from_secs(60));
    }

    #[test]
    fn invalid_interval_override_is_ignored() {
        let config = SyncConfig::default().with_overrides(|key| {
            (key == ENV_SYNC_INTERVAL_SECS).then(|| "soon".to_string())
        });
        assert_eq!(config.sync_interval_secs, 300);
    }

    #[test]
    fn validate_requires_http_scheme() {
        let config = SyncConfig::new("project.example.co", "anon");
        assert!(config.validate().is_err());
        assert!(SyncConfig::new("https://project.example.co", "anon")
            .validate()
            .is_ok());
    }

    #[test]
    fn load_from_missing_path_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn load_from_path_applies_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(
            &path,
            r#"{"remote_url":"https://project.example.co/","api_key":"anon","retry_ceiling":5}"#,
        )
        .unwrap();

        let config = SyncConfig::load_from_path(&path).unwrap();
        assert_eq!(config.remote_url.as_deref(), Some("https://project.example.co"));
        assert_eq!(config.retry_ceiling, 5);
        assert_eq!(config.retry_max_attempts, 3);
    }
}
