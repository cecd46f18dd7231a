//! Cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for an extraction result.
///
/// The key is a SHA-256 over the normalized URL and the dictionary
/// language; the same page scraped for a different language is a
/// different entry.
pub fn compute_cache_key(normalized_url: &str, language: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    hasher.update(b"\n");
    hasher.update(language.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_cache_key("https://example.com/careers", "en");
        let hash2 = compute_cache_key("https://example.com/careers", "en");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_language_sensitive() {
        let en = compute_cache_key("https://example.com/careers", "en");
        let de = compute_cache_key("https://example.com/careers", "de");
        assert_ne!(en, de);
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("https://example.com/careers", "en");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
