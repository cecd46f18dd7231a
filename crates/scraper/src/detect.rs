//! Platform detection against dictionary signatures.
//!
//! URL-substring matching runs first because it needs no DOM work; HTML
//! indicator matching only runs when the URL was inconclusive and markup
//! is available. Ties break by dictionary declaration order: the first
//! matching signature wins, by contract rather than by score.

use joblens_core::{Dictionary, PlatformSignature};
use std::sync::Arc;

/// Detects which known ATS platform a page belongs to.
pub struct PlatformDetector {
    dictionary: Arc<Dictionary>,
}

impl PlatformDetector {
    pub fn new(dictionary: Arc<Dictionary>) -> Self {
        Self { dictionary }
    }

    /// Return the best platform guess for a URL and optional HTML.
    ///
    /// First signature (declaration order) whose URL pattern matches wins;
    /// indicator matching is the fallback when HTML is available.
    pub fn detect(&self, url: &str, html: Option<&str>) -> Option<&PlatformSignature> {
        let platforms = self.dictionary.known_platforms();

        if let Some(sig) = platforms.iter().find(|sig| sig.matches_url(url)) {
            tracing::debug!("platform {} detected from URL {}", sig.name, url);
            return Some(sig);
        }

        if let Some(html) = html
            && let Some(sig) = platforms.iter().find(|sig| sig.matches_html(html))
        {
            tracing::debug!("platform {} detected from HTML indicators", sig.name);
            return Some(sig);
        }

        None
    }

    /// Hard-negative check: does the HTML carry an indicator for a
    /// *different* named platform?
    ///
    /// Cross-platform selectors can corrupt structurally different markup,
    /// so applicability must return false on a conflict instead of
    /// attempting extraction.
    pub fn conflicting_platform(&self, signature: &PlatformSignature, html: &str) -> bool {
        self.dictionary
            .known_platforms()
            .iter()
            .filter(|other| other.name != signature.name)
            .any(|other| other.matches_html(html))
    }
}
