//! Application configuration with layered loading.
//!
//! Uses figment for layered configuration loading:
//!
//! 1. Environment variables (JOBLENS_*)
//! 2. TOML config file (if JOBLENS_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Pipeline-wide configuration.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (JOBLENS_*)
/// 2. TOML config file (if JOBLENS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite result cache.
    ///
    /// Set via JOBLENS_DB_PATH.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests and robots.txt evaluation.
    ///
    /// Set via JOBLENS_USER_AGENT.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via JOBLENS_MAX_BYTES.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via JOBLENS_TIMEOUT_MS.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Browser navigation timeout in milliseconds.
    ///
    /// Set via JOBLENS_NAVIGATION_TIMEOUT_MS.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Settle delay after each expansion click, in milliseconds.
    ///
    /// Set via JOBLENS_SETTLE_MS.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Whether to respect robots.txt rules.
    ///
    /// Set via JOBLENS_RESPECT_ROBOTS.
    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Whether headless rendering steps are enabled.
    ///
    /// Set via JOBLENS_RENDER_ENABLED.
    #[serde(default = "default_true")]
    pub render_enabled: bool,

    /// Result cache TTL in seconds; 0 disables caching.
    ///
    /// Set via JOBLENS_CACHE_TTL_SECS.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum concurrent URLs in a batch scrape.
    ///
    /// Set via JOBLENS_BATCH_CONCURRENCY.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./joblens-cache.sqlite")
}

fn default_user_agent() -> String {
    "joblens/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_settle_ms() -> u64 {
    1_200
}

fn default_cache_ttl_secs() -> u64 {
    6 * 60 * 60
}

fn default_batch_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            settle_ms: default_settle_ms(),
            respect_robots: true,
            render_enabled: true,
            cache_ttl_secs: default_cache_ttl_secs(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

impl AppConfig {
    /// HTTP timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Navigation timeout as a Duration.
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, an environment
    /// variable fails to parse, or validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("JOBLENS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("JOBLENS_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./joblens-cache.sqlite"));
        assert_eq!(config.user_agent, "joblens/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.navigation_timeout_ms, 30_000);
        assert!(config.respect_robots);
        assert!(config.render_enabled);
        assert_eq!(config.batch_concurrency, 4);
    }

    #[test]
    fn test_timeout_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.navigation_timeout(), Duration::from_millis(30_000));
    }
}
