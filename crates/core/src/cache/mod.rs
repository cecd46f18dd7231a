//! Result cache for validated extraction results.
//!
//! Keys are SHA-256 hashes of the normalized URL plus language. A cache hit
//! is treated as a validated result and bypasses the pipeline entirely;
//! TTL policy is owned by the caller via the `ttl` argument.
//!
//! Two implementations: `CacheDb` (SQLite, WAL mode, versioned migrations)
//! for production, `MemoryCache` for tests and short-lived callers.

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod results;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::Error;
use crate::model::ExtractionResult;

pub use connection::CacheDb;
pub use hash::compute_cache_key;
pub use results::CachedResult;

/// Cache collaborator interface.
///
/// `get` must only return entries that are still fresh; `put` stores a
/// validated result with an optional expiry.
#[async_trait::async_trait]
pub trait ResultCache: Send + Sync {
    /// Look up a fresh cached result by key.
    async fn get(&self, key: &str) -> Result<Option<ExtractionResult>, Error>;

    /// Store a validated result under its language; `ttl` of `None`
    /// means no expiry.
    async fn put(&self, key: &str, result: &ExtractionResult, language: &str, ttl: Option<Duration>)
    -> Result<(), Error>;
}

/// In-memory cache used by tests and short-lived callers.
#[derive(Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, (ExtractionResult, Option<chrono::DateTime<chrono::Utc>>)>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<ExtractionResult>, Error> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((result, expires_at)) => {
                if let Some(expiry) = expires_at
                    && *expiry <= chrono::Utc::now()
                {
                    return Ok(None);
                }
                Ok(Some(result.clone()))
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self, key: &str, result: &ExtractionResult, _language: &str, ttl: Option<Duration>,
    ) -> Result<(), Error> {
        let expires_at = ttl.and_then(|t| chrono::Duration::from_std(t).ok()).map(|d| chrono::Utc::now() + d);
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (result.clone(), expires_at));
        Ok(())
    }
}
