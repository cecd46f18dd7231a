//! HTML content extraction: text flattening, titles, and iframe discovery.
//!
//! Keeps DOM handling in one place so steps operate on plain strings and
//! `JobLink` values.

pub mod jsonld;
pub mod links;

use scraper::{Html, Selector};
use url::Url;

pub use jsonld::harvest_jsonld_postings;
pub use links::{RawLink, classify_links, harvest_links};

/// Tags whose text content is never page content.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Flatten an HTML document to whitespace-normalized text.
///
/// Script/style/noscript/template content is dropped; all remaining text
/// nodes are joined with single spaces.
pub fn flatten_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        if let Some(text) = node.value().as_text() {
            let in_skipped = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map(|e| SKIPPED_TAGS.contains(&e.name()))
                    .unwrap_or(false)
            });
            if in_skipped {
                continue;
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
    }

    let joined = parts.join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the page title: `<title>` first, first `<h1>` as fallback.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for selector_str in ["title", "h1"] {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }

    None
}

/// Collect iframe source URLs, resolved against the base URL.
///
/// Only http(s) frames are returned; `about:blank` and data URIs are
/// dropped.
pub fn find_iframe_sources(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("iframe[src]") else {
        return Vec::new();
    };

    let mut sources = Vec::new();
    for element in document.select(&selector) {
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        let Ok(resolved) = base_url.join(src) else {
            continue;
        };
        if matches!(resolved.scheme(), "http" | "https") {
            let s = resolved.to_string();
            if !sources.contains(&s) {
                sources.push(s);
            }
        }
    }

    sources
}
