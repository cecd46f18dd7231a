//! URL canonicalization for consistent caching and safety checks.

/// Query parameters stripped during normalization. Tracking params make
/// otherwise-identical career pages look distinct to the cache.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
    "mc_cid",
    "mc_eid",
    "ref",
];

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Drop known tracking query parameters, keep the rest in order
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    if parsed.query().is_some() {
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            serializer.extend_pairs(kept);
            let query = serializer.finish();
            parsed.set_query(Some(&query));
        }
    }

    Ok(parsed)
}

/// Normalized string form used for cache keys.
pub fn normalize_for_cache(input: &str) -> Result<String, UrlError> {
    Ok(canonicalize(input)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("https://example.com/careers").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/careers");
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("example.com/jobs").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://EXAMPLE.COM/Careers").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        // Path case is meaningful and preserved.
        assert_eq!(url.path(), "/Careers");
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let url = canonicalize("https://example.com/careers#openings").unwrap();
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_canonicalize_strips_tracking_params() {
        let url = canonicalize("https://example.com/careers?utm_source=linkedin&dept=eng").unwrap();
        assert_eq!(url.query(), Some("dept=eng"));
    }

    #[test]
    fn test_canonicalize_drops_query_when_all_tracking() {
        let url = canonicalize("https://example.com/careers?utm_source=x&gclid=123").unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_canonicalize_preserves_meaningful_query() {
        let url = canonicalize("https://example.com/jobs?page=2&team=platform").unwrap();
        assert_eq!(url.query(), Some("page=2&team=platform"));
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  https://example.com  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize(""), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_normalize_for_cache_stable() {
        let a = normalize_for_cache("https://Example.com/careers?utm_source=a#x").unwrap();
        let b = normalize_for_cache("https://example.com/careers").unwrap();
        assert_eq!(a, b);
    }
}
