//! HTTP fetch pipeline with SSRF protection and robots.txt compliance.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Lowercase host, remove fragments, strip tracking params
//!
//! ### Safety Gates
//! - Deny non-http(s) schemes and private/metadata targets
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! ### robots.txt Compliance
//! - Fetch and cache `robots.txt` per host (24h cache)
//! - Evaluated for the configured User-Agent

pub mod robots;
pub mod ssrf;
pub mod url;

use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use robots::{RobotsCache, RobotsError};
pub use ssrf::{SsrfError, validate_ip, validate_url};
pub use url::{UrlError, canonicalize, normalize_for_cache};

use joblens_core::Error;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "joblens/0.1")
    pub user_agent: String,

    /// Accept-Language header value (default: "en")
    pub language: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Whether to respect robots.txt (default: true)
    pub respect_robots: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "joblens/0.1".to_string(),
            language: "en".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20_000),
            max_redirects: 5,
            respect_robots: true,
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The canonicalized URL that was requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Body decoded as (lossy) UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }

    /// True when the Content-Type looks like HTML.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
            .unwrap_or(true)
    }
}

/// HTTP fetch client with safety checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    robots_cache: RobotsCache,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        let robots_cache =
            RobotsCache::new(config.user_agent.clone()).map_err(|e| Error::HttpError(e.to_string()))?;

        Ok(Self { http, config, robots_cache })
    }

    /// Fetch a URL as HTML/text, returning raw bytes and metadata.
    ///
    /// Performs SSRF and robots.txt checks and enforces redirect/byte
    /// limits.
    pub async fn fetch(&self, url_str: &str) -> Result<FetchResponse, Error> {
        let url = canonicalize(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        self.fetch_url(&url, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .await
    }

    /// Fetch a URL expecting a JSON payload (API probing).
    pub async fn fetch_json(&self, url_str: &str) -> Result<FetchResponse, Error> {
        let url = canonicalize(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        self.fetch_url(&url, "application/json").await
    }

    async fn fetch_url(&self, url: &Url, accept: &str) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        validate_url(url).map_err(|e| Error::SsrfBlocked(e.to_string()))?;

        if self.config.respect_robots {
            let allowed = self
                .robots_cache
                .is_allowed(url)
                .await
                .map_err(|e| Error::HttpError(e.to_string()))?;
            if !allowed {
                return Err(Error::RobotsDisallowed(url.path().to_string()));
            }
        }

        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, accept)
            .header(header::ACCEPT_LANGUAGE, &self.config.language)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(url.to_string())
                } else {
                    Error::HttpError(format!("network error: {e}"))
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {e}")))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, final_url, fetch_ms, bytes.len());

        Ok(FetchResponse { url: url.clone(), final_url, status, content_type, bytes, fetch_ms })
    }

    /// Get reference to the robots cache.
    pub fn robots_cache(&self) -> &RobotsCache {
        &self.robots_cache
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "joblens/0.1");
        assert_eq!(config.language, "en");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.max_redirects, 5);
        assert!(config.respect_robots);
    }

    #[test]
    fn test_fetch_response_text_and_html() {
        let response = FetchResponse {
            url: Url::parse("https://example.com").unwrap(),
            final_url: Url::parse("https://example.com").unwrap(),
            status: StatusCode::OK,
            content_type: Some("text/html; charset=utf-8".to_string()),
            bytes: Bytes::from_static(b"<html></html>"),
            fetch_ms: 10,
        };

        assert_eq!(response.text(), "<html></html>");
        assert!(response.is_html());

        let json = FetchResponse { content_type: Some("application/json".to_string()), ..response };
        assert!(!json.is_html());
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_rejects_private_target() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let result = client.fetch("http://192.168.0.1/admin").await;
        assert!(matches!(result, Err(Error::SsrfBlocked(_))));
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_url() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let result = client.fetch("").await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
