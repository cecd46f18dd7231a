//! Link harvesting and job-link classification.
//!
//! Harvesting pulls every `<a href>` out of a document with resolved URLs;
//! classification turns raw links into `JobLink` candidates using the
//! dictionary's URL patterns and vocabulary. Confidence assigned here is a
//! pre-score; the relevance scorer replaces it when search terms are given.

use joblens_core::{Dictionary, JobLink, LinkType};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Pre-score for links whose URL matches a job pattern.
const URL_PATTERN_CONFIDENCE: f64 = 0.6;

/// Pre-score for links that only match on vocabulary in the text.
const VOCAB_CONFIDENCE: f64 = 0.4;

/// Pre-score for contact/about pages surfaced as career portals.
const PORTAL_CONFIDENCE: f64 = 0.3;

/// URL substrings that mark a contact/about page.
const CONTACT_PATTERNS: &[&str] = &["/contact", "/about", "/impressum", "/team"];

/// A harvested link with text and resolved href.
#[derive(Debug, Clone)]
pub struct RawLink {
    /// Link text content.
    pub text: String,
    /// Resolved absolute URL.
    pub url: String,
}

/// Extract links from an HTML document, resolving relative URLs.
///
/// `mailto:`/`tel:` anchors and duplicate hrefs are dropped; discovery
/// order is preserved.
pub fn harvest_links(html: &str, base_url: &Url) -> Vec<RawLink> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        if href.starts_with("mailto:") || href.starts_with("tel:") || href.starts_with('#') {
            continue;
        }

        let Ok(resolved) = base_url.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        let resolved = resolved.to_string();
        if !seen.insert(resolved.clone()) {
            continue;
        }

        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        links.push(RawLink { text, url: resolved });
    }

    links
}

/// Classify raw links into job-link candidates.
///
/// A link qualifies when its URL matches a job pattern or its text hits the
/// job vocabulary. With `include_contact_pages`, contact/about URLs are
/// kept as `CareerPortal` candidates for the caller-side harvester.
pub fn classify_links(raw: &[RawLink], dictionary: &Dictionary, include_contact_pages: bool) -> Vec<JobLink> {
    let mut out = Vec::new();

    for link in raw {
        let url_lower = link.url.to_lowercase();

        let pattern_match = dictionary
            .job_url_patterns()
            .iter()
            .any(|p| url_lower.contains(&p.to_lowercase()));

        if pattern_match {
            let link_type = if looks_like_posting(&url_lower) { LinkType::JobPosting } else { LinkType::JobListing };
            out.push(JobLink::new(&link.url, &link.text, link_type, URL_PATTERN_CONFIDENCE));
            continue;
        }

        if !link.text.is_empty() && dictionary.job_term_hits(&link.text) > 0 {
            out.push(JobLink::new(&link.url, &link.text, LinkType::JobListing, VOCAB_CONFIDENCE));
            continue;
        }

        if include_contact_pages && CONTACT_PATTERNS.iter().any(|p| url_lower.contains(p)) {
            out.push(JobLink::new(&link.url, &link.text, LinkType::CareerPortal, PORTAL_CONFIDENCE));
        }
    }

    out
}

/// Heuristic: a pattern-matched URL pointing at an individual posting has a
/// trailing slug or numeric id after the pattern segment.
fn looks_like_posting(url_lower: &str) -> bool {
    let Some(path_start) = url_lower.find("://").map(|i| i + 3) else {
        return false;
    };
    let path = url_lower[path_start..].split_once('/').map(|(_, p)| p).unwrap_or("");

    let segments: Vec<&str> = path
        .split(['/', '?'])
        .filter(|s| !s.is_empty())
        .collect();

    match segments.last() {
        Some(last) => {
            let is_section = [
                "jobs",
                "job",
                "careers",
                "career",
                "vacancies",
                "vacancy",
                "positions",
                "openings",
                "opportunities",
            ]
            .contains(last);
            !is_section
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://acme.example/careers").unwrap()
    }

    #[test]
    fn test_harvest_basic() {
        let html = r#"<a href="https://acme.example/jobs/1">Engineer</a>"#;
        let links = harvest_links(html, &base());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "Engineer");
        assert_eq!(links[0].url, "https://acme.example/jobs/1");
    }

    #[test]
    fn test_harvest_resolves_relative() {
        let html = r#"<a href="/jobs/2">Designer</a><a href="openings">All</a>"#;
        let links = harvest_links(html, &base());
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://acme.example/jobs/2");
        assert_eq!(links[1].url, "https://acme.example/openings");
    }

    #[test]
    fn test_harvest_skips_mailto_and_fragments() {
        let html = r##"
            <a href="mailto:hr@acme.example">Mail us</a>
            <a href="tel:+1555">Call</a>
            <a href="#listing">Jump</a>
            <a href="/jobs/3">Analyst</a>
        "##;
        let links = harvest_links(html, &base());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://acme.example/jobs/3");
    }

    #[test]
    fn test_harvest_dedupes_preserving_first() {
        let html = r#"<a href="/jobs/1">First</a><a href="/jobs/1">Second</a>"#;
        let links = harvest_links(html, &base());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "First");
    }

    #[test]
    fn test_harvest_collapses_multiline_text() {
        let html = "<a href=\"/jobs/1\">\n  Senior\n  Engineer\n</a>";
        let links = harvest_links(html, &base());
        assert_eq!(links[0].text, "Senior Engineer");
    }

    #[test]
    fn test_classify_pattern_match_posting() {
        let dict = Dictionary::english();
        let raw = vec![RawLink { text: "Senior Backend Engineer".to_string(), url: "https://acme.example/jobs/senior-backend-engineer".to_string() }];

        let links = classify_links(&raw, &dict, false);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::JobPosting);
        assert!(links[0].is_job_posting);
    }

    #[test]
    fn test_classify_pattern_match_listing_root() {
        let dict = Dictionary::english();
        let raw = vec![RawLink { text: "All jobs".to_string(), url: "https://acme.example/jobs/".to_string() }];

        let links = classify_links(&raw, &dict, false);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::JobListing);
    }

    #[test]
    fn test_classify_vocab_only() {
        let dict = Dictionary::english();
        let raw = vec![RawLink { text: "See our open positions".to_string(), url: "https://acme.example/working-here".to_string() }];

        let links = classify_links(&raw, &dict, false);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::JobListing);
    }

    #[test]
    fn test_classify_ignores_unrelated() {
        let dict = Dictionary::english();
        let raw = vec![RawLink { text: "Our products".to_string(), url: "https://acme.example/products".to_string() }];
        assert!(classify_links(&raw, &dict, false).is_empty());
    }

    #[test]
    fn test_classify_contact_pages_gated() {
        let dict = Dictionary::english();
        let raw = vec![RawLink { text: "Contact".to_string(), url: "https://acme.example/contact".to_string() }];

        assert!(classify_links(&raw, &dict, false).is_empty());

        let links = classify_links(&raw, &dict, true);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::CareerPortal);
    }
}
