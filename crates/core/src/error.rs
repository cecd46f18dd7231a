//! Unified error types for joblens.
//!
//! The pipeline itself never surfaces transient per-method failures; these
//! variants cover input validation, fetch-layer refusals, cache/database
//! faults, and browser setup failures that callers may want to distinguish.

use tokio_rusqlite::rusqlite;

/// Unified error type for the extraction pipeline and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// URL failed canonicalization.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// SSRF blocked - private/internal address not allowed.
    #[error("SSRF_BLOCKED: {0}")]
    SsrfBlocked(String),

    /// robots.txt disallowed access.
    #[error("ROBOTS_DISALLOWED: {0}")]
    RobotsDisallowed(String),

    /// Fetch timed out.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response exceeded the byte cap.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP error response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Headless rendering is disabled (feature off or config off).
    #[error("RENDER_DISABLED")]
    RenderDisabled,

    /// Browser launch or page setup failed.
    #[error("RENDER_FAILED: {0}")]
    RenderFailed(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Dictionary payload failed to parse.
    #[error("DICTIONARY_ERROR: {0}")]
    Dictionary(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_codes() {
        let err = Error::InvalidUrl("not a url".to_string());
        assert!(err.to_string().starts_with("INVALID_URL"));

        let err = Error::RenderDisabled;
        assert_eq!(err.to_string(), "RENDER_DISABLED");
    }

    #[test]
    fn test_error_display_message() {
        let err = Error::HttpError("status 503".to_string());
        assert!(err.to_string().contains("503"));
    }
}
