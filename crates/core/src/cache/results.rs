//! Cached-result CRUD operations.
//!
//! Stores validated `ExtractionResult`s as JSON alongside the metadata
//! needed for freshness checks and purging.

use std::time::Duration;

use super::connection::CacheDb;
use crate::Error;
use crate::cache::ResultCache;
use crate::model::ExtractionResult;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached extraction result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResult {
    pub key: String,
    pub url: String,
    pub language: String,
    pub result_json: String,
    pub detected_platform: Option<String>,
    pub method: Option<String>,
    pub scraped_at: String,
    pub expires_at: Option<String>,
}

impl CacheDb {
    /// Insert or update a cached result row.
    pub async fn upsert_result(&self, row: &CachedResult) -> Result<(), Error> {
        let row = row.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO results (
                        key, url, language, result_json, detected_platform, method,
                        scraped_at, expires_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(key) DO UPDATE SET
                        url = excluded.url,
                        language = excluded.language,
                        result_json = excluded.result_json,
                        detected_platform = excluded.detected_platform,
                        method = excluded.method,
                        scraped_at = excluded.scraped_at,
                        expires_at = excluded.expires_at",
                    params![
                        &row.key,
                        &row.url,
                        &row.language,
                        &row.result_json,
                        &row.detected_platform,
                        &row.method,
                        &row.scraped_at,
                        &row.expires_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a result row by key, fresh or not.
    pub async fn get_result_row(&self, key: &str) -> Result<Option<CachedResult>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResult>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, url, language, result_json, detected_platform, method,
                            scraped_at, expires_at
                     FROM results WHERE key = ?1",
                )?;

                let result = stmt.query_row(params![key], |row| {
                    Ok(CachedResult {
                        key: row.get(0)?,
                        url: row.get(1)?,
                        language: row.get(2)?,
                        result_json: row.get(3)?,
                        detected_platform: row.get(4)?,
                        method: row.get(5)?,
                        scraped_at: row.get(6)?,
                        expires_at: row.get(7)?,
                    })
                });

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired rows; returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM results WHERE expires_at IS NOT NULL AND expires_at < ?1",
                    params![now],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete rows whose URL contains the given domain; returns the count.
    pub async fn purge_by_domain(&self, domain: &str) -> Result<u64, Error> {
        let pattern = format!("%{domain}%");
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM results WHERE url LIKE ?1", params![pattern])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait::async_trait]
impl ResultCache for CacheDb {
    async fn get(&self, key: &str) -> Result<Option<ExtractionResult>, Error> {
        let Some(row) = self.get_result_row(key).await? else {
            return Ok(None);
        };

        if let Some(expires_at) = &row.expires_at
            && let Ok(expiry) = chrono::DateTime::parse_from_rfc3339(expires_at)
            && expiry <= chrono::Utc::now()
        {
            return Ok(None);
        }

        match serde_json::from_str(&row.result_json) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                // Corrupt rows are treated as misses, not hard failures.
                tracing::warn!("discarding undecodable cache row {}: {}", row.key, e);
                Ok(None)
            }
        }
    }

    async fn put(
        &self, key: &str, result: &ExtractionResult, language: &str, ttl: Option<Duration>,
    ) -> Result<(), Error> {
        let expires_at = ttl
            .and_then(|t| chrono::Duration::from_std(t).ok())
            .map(|d| (chrono::Utc::now() + d).to_rfc3339());

        let row = CachedResult {
            key: key.to_string(),
            url: result.url.clone(),
            language: language.to_string(),
            result_json: serde_json::to_string(result).map_err(|e| Error::InvalidInput(e.to_string()))?,
            detected_platform: result.detected_platform.clone(),
            method: result.method.clone(),
            scraped_at: result.scraped_at.to_rfc3339(),
            expires_at,
        };

        self.upsert_result(&row).await
    }
}
