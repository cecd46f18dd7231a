//! JSON-LD structured-data probe.
//!
//! Many career pages embed schema.org `JobPosting` blocks even when the
//! visible markup is rendered client-side. Harvesting them is cheaper and
//! more reliable than DOM scraping, so steps try this before falling back.

use joblens_core::{JobLink, LinkType};
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

/// Confidence for links backed by a structured JobPosting block.
const JSONLD_CONFIDENCE: f64 = 0.85;

/// Harvest schema.org JobPosting entries from `ld+json` script blocks.
///
/// Handles single objects, top-level arrays, and `@graph` containers.
/// Malformed JSON blocks are skipped silently.
pub fn harvest_jsonld_postings(html: &str, base_url: &Url) -> Vec<JobLink> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut links = Vec::new();

    for element in document.select(&selector) {
        let raw = element.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };

        for node in iter_nodes(&value) {
            if let Some(link) = posting_to_link(node, base_url) {
                if !links.iter().any(|l: &JobLink| l.url == link.url) {
                    links.push(link);
                }
            }
        }
    }

    links
}

/// Flatten a JSON-LD value into candidate nodes: the value itself, array
/// elements, and `@graph` members.
fn iter_nodes(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("@graph") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => vec![value],
        },
        _ => Vec::new(),
    }
}

fn posting_to_link(node: &Value, base_url: &Url) -> Option<JobLink> {
    let obj = node.as_object()?;

    let is_posting = match obj.get("@type") {
        Some(Value::String(t)) => t == "JobPosting",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("JobPosting")),
        _ => false,
    };
    if !is_posting {
        return None;
    }

    let title = obj.get("title").and_then(Value::as_str)?.trim().to_string();
    if title.is_empty() {
        return None;
    }

    let url = obj
        .get("url")
        .and_then(Value::as_str)
        .and_then(|u| base_url.join(u).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| base_url.to_string());

    let mut link = JobLink::new(url, title, LinkType::JobPosting, JSONLD_CONFIDENCE);

    link.location = obj
        .get("jobLocation")
        .and_then(extract_locality)
        .or_else(|| obj.get("jobLocationType").and_then(Value::as_str).map(String::from));

    link.department = obj
        .get("department")
        .and_then(|d| d.as_str().or_else(|| d.get("name").and_then(Value::as_str)))
        .map(String::from);

    Some(link)
}

/// Pull a locality out of a `jobLocation` value (object or array of
/// objects with a nested `address`).
fn extract_locality(location: &Value) -> Option<String> {
    let obj = match location {
        Value::Array(items) => items.first()?.as_object()?,
        Value::Object(map) => map,
        _ => return None,
    };

    let address = obj.get("address")?;
    address
        .get("addressLocality")
        .or_else(|| address.get("addressRegion"))
        .and_then(Value::as_str)
        .map(String::from)
}
