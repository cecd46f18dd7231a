//! robots.txt compliance with per-host caching.
//!
//! Fetches and caches robots.txt per host with a 24-hour TTL. A missing or
//! client-error robots.txt allows everything; a server error is reported so
//! the fetch layer can decide.

use robotstxt_rs::RobotsTxt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

/// Default TTL for cached robots.txt entries.
const ROBOTS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Maximum robots.txt size to fetch (1MB).
const MAX_ROBOTS_SIZE: usize = 1024 * 1024;

/// Error type for robots.txt operations.
#[derive(Debug, thiserror::Error)]
pub enum RobotsError {
    #[error("failed to fetch robots.txt: {0}")]
    FetchError(String),

    #[error("robots.txt too large")]
    TooLarge,
}

struct CachedRobots {
    robots: RobotsTxt,
    fetched_at: Instant,
}

impl CachedRobots {
    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > ROBOTS_TTL
    }
}

/// In-memory, per-host robots.txt cache.
pub struct RobotsCache {
    cache: Arc<RwLock<HashMap<String, CachedRobots>>>,
    user_agent: String,
    http: reqwest::Client,
}

impl RobotsCache {
    /// Create a new robots.txt cache.
    ///
    /// # Errors
    ///
    /// Returns an error when the internal HTTP client cannot be built.
    pub fn new(user_agent: String) -> Result<Self, RobotsError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RobotsError::FetchError(e.to_string()))?;

        Ok(Self { cache: Arc::new(RwLock::new(HashMap::new())), user_agent, http })
    }

    /// Check whether `url` may be fetched under the configured user agent.
    ///
    /// Fetches and caches robots.txt for the host on first use.
    pub async fn is_allowed(&self, url: &Url) -> Result<bool, RobotsError> {
        let robots_url = format!("{}://{}/robots.txt", url.scheme(), url.host_str().unwrap_or(""));

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&robots_url)
                && !cached.is_expired()
            {
                let allowed = cached.robots.can_fetch(&self.user_agent, url.as_str());
                tracing::debug!("robots.txt cache hit for {}: allowed={}", robots_url, allowed);
                return Ok(allowed);
            }
        }

        let robots = self.fetch_robots(&robots_url).await?;
        let allowed = robots.can_fetch(&self.user_agent, url.as_str());

        let mut cache = self.cache.write().await;
        cache.insert(robots_url, CachedRobots { robots, fetched_at: Instant::now() });

        Ok(allowed)
    }

    async fn fetch_robots(&self, robots_url: &str) -> Result<RobotsTxt, RobotsError> {
        let response = self
            .http
            .get(robots_url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| RobotsError::FetchError(e.to_string()))?;

        let status = response.status();

        if status.is_client_error() {
            tracing::debug!("no robots.txt at {}, allowing all", robots_url);
            return Ok(RobotsTxt::parse(""));
        }

        if !status.is_success() {
            return Err(RobotsError::FetchError(format!("status {status}")));
        }

        if let Some(len) = response.content_length()
            && len as usize > MAX_ROBOTS_SIZE
        {
            return Err(RobotsError::TooLarge);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RobotsError::FetchError(e.to_string()))?;

        if bytes.len() > MAX_ROBOTS_SIZE {
            return Err(RobotsError::TooLarge);
        }

        Ok(RobotsTxt::parse(&String::from_utf8_lossy(&bytes)))
    }

    /// Drop expired entries.
    pub async fn cleanup_expired(&self) {
        let mut cache = self.cache.write().await;
        cache.retain(|_, cached| !cached.is_expired());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_robots_expiry() {
        let robots = RobotsTxt::parse("User-agent: *\nAllow: /");
        let mut cached = CachedRobots { robots, fetched_at: Instant::now() };
        assert!(!cached.is_expired());

        cached.fetched_at = Instant::now() - ROBOTS_TTL - Duration::from_secs(1);
        assert!(cached.is_expired());
    }

    #[tokio::test]
    async fn test_robots_cache_new() {
        let cache = RobotsCache::new("joblens/0.1".to_string()).unwrap();
        assert_eq!(cache.user_agent, "joblens/0.1");
    }

    #[tokio::test]
    async fn test_cleanup_drops_expired() {
        let cache = RobotsCache::new("joblens/0.1".to_string()).unwrap();
        {
            let mut c = cache.cache.write().await;
            c.insert(
                "https://example.com/robots.txt".to_string(),
                CachedRobots {
                    robots: RobotsTxt::parse("User-agent: *\nAllow: /"),
                    fetched_at: Instant::now() - ROBOTS_TTL - Duration::from_secs(1),
                },
            );
        }

        cache.cleanup_expired().await;

        let c = cache.cache.read().await;
        assert!(c.is_empty());
    }
}
