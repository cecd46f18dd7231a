//! Platform-specific extraction steps.
//!
//! One step instance per dictionary platform signature. A platform step
//! only runs when detection pinned its platform for the call, and backs
//! off when the page carries another platform's indicators. Strategy
//! order inside the step: parse the DOM, probe the platform's JSON API
//! with the company slug filled in, then fall back to headless rendering
//! when enabled.

use crate::detect::PlatformDetector;
use crate::fetch::FetchClient;
use crate::steps::{ExtractionStep, PRIORITY_PLATFORM_BASE, build_result};
use joblens_core::{
    Dictionary, Error, ExtractionResult, JobLink, LinkType, PipelineContext, PlatformSignature, ScrapeOptions,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

#[cfg(feature = "render")]
use crate::expand::{ExpansionConfig, ExpansionEngine};
#[cfg(feature = "render")]
use crate::render::{BrowserHandle, RenderOptions};

/// Confidence for links sourced from a platform's own API.
const API_CONFIDENCE: f64 = 0.8;

/// Path segments that are never a company slug.
const GENERIC_SEGMENTS: &[&str] = &["jobs", "job", "careers", "career", "embed", "boards", "postings", "widgets"];

pub struct PlatformStep {
    signature: PlatformSignature,
    name: String,
    priority: u32,
    fetch: Arc<FetchClient>,
    dictionary: Arc<Dictionary>,
    detector: Arc<PlatformDetector>,
    #[cfg(feature = "render")]
    browser: Option<Arc<BrowserHandle>>,
}

impl PlatformStep {
    /// Build a step for one signature. `index` is the signature's
    /// declaration position in the dictionary and keeps platform steps
    /// in declaration order within their priority band.
    pub fn new(
        signature: PlatformSignature, index: u32, fetch: Arc<FetchClient>, dictionary: Arc<Dictionary>,
        detector: Arc<PlatformDetector>,
    ) -> Self {
        let name = format!("platform:{}", signature.name);
        Self {
            signature,
            name,
            priority: PRIORITY_PLATFORM_BASE + index,
            fetch,
            dictionary,
            detector,
            #[cfg(feature = "render")]
            browser: None,
        }
    }

    /// Attach the shared browser for the headless fallback.
    #[cfg(feature = "render")]
    pub fn with_browser(mut self, browser: Arc<BrowserHandle>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Probe the platform API, filling the `{company}` slot from the URL.
    async fn probe_api(&self, url: &Url) -> Result<Option<ExtractionResult>, Error> {
        let Some(company) = company_slug(url) else {
            return Ok(None);
        };

        for pattern in &self.signature.api_patterns {
            let api_url = pattern.replace("{company}", &company);
            tracing::debug!("probing {} API at {api_url}", self.signature.name);

            let response = match self.fetch.fetch_json(&api_url).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!("API probe {api_url} failed: {e}");
                    continue;
                }
            };

            let Ok(value) = serde_json::from_slice::<Value>(&response.bytes) else {
                continue;
            };

            let links = postings_from_json(&value, url);
            if !links.is_empty() {
                let text = links.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n");
                return Ok(Some(ExtractionResult::new(url.as_str(), text, links)));
            }
        }

        Ok(None)
    }

    #[cfg(feature = "render")]
    async fn render_fallback(
        &self, url: &Url, opts: &ScrapeOptions,
    ) -> Result<Option<ExtractionResult>, Error> {
        let Some(browser) = &self.browser else {
            return Ok(None);
        };
        if !opts.use_headless_fallback {
            return Ok(None);
        }

        let engine = ExpansionEngine::new(self.dictionary.clone(), ExpansionConfig::default());
        let render_opts = RenderOptions { timeout_ms: opts.timeout_ms, ..Default::default() };
        let page = browser.render_expanded(url, &render_opts, &engine).await?;

        Ok(build_result(&page.final_url, &page.html, &self.dictionary, opts))
    }

    #[cfg(not(feature = "render"))]
    async fn render_fallback(
        &self, _url: &Url, _opts: &ScrapeOptions,
    ) -> Result<Option<ExtractionResult>, Error> {
        Ok(None)
    }
}

#[async_trait]
impl ExtractionStep for PlatformStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    /// Runs only for its own detected platform, and never against markup
    /// carrying a different platform's indicators.
    fn is_applicable(&self, _url: &Url, ctx: &PipelineContext) -> bool {
        if ctx.detected_platform.as_deref() != Some(self.signature.name.as_str()) {
            return false;
        }

        if let Some(html) = &ctx.html_content
            && self.detector.conflicting_platform(&self.signature, html)
        {
            tracing::debug!("conflicting platform indicators, {} backing off", self.name);
            return false;
        }

        true
    }

    async fn scrape(
        &self, url: &Url, opts: &ScrapeOptions, ctx: &PipelineContext,
    ) -> Result<Option<ExtractionResult>, Error> {
        // DOM parse first; platform boards are often server-rendered.
        let html = match &ctx.html_content {
            Some(html) => Some(html.clone()),
            None => match self.fetch.fetch(url.as_str()).await {
                Ok(r) if r.is_html() => Some(r.text()),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!("platform fetch failed: {e}");
                    None
                }
            },
        };

        if let Some(html) = &html
            && let Some(result) = build_result(url, html, &self.dictionary, opts)
            && result.links.iter().any(|l| l.is_job_posting)
        {
            return Ok(Some(result));
        }

        if let Some(result) = self.probe_api(url).await? {
            return Ok(Some(result));
        }

        self.render_fallback(url, opts).await
    }
}

/// Extract the company slug for `{company}` API slots.
///
/// Hosted boards put the slug in the first path segment
/// (`boards.greenhouse.io/acme`); subdomain-style platforms put it in the
/// first host label (`acme.jobs.personio.de`).
fn company_slug(url: &Url) -> Option<String> {
    if let Some(segments) = url.path_segments() {
        for segment in segments {
            if segment.is_empty() {
                continue;
            }
            let lower = segment.to_lowercase();
            if !GENERIC_SEGMENTS.contains(&lower.as_str()) {
                return Some(lower);
            }
        }
    }

    let host = url.host_str()?;
    let label = host.split('.').next()?;
    if label.is_empty() || label == "www" {
        return None;
    }
    Some(label.to_lowercase())
}

/// Pull postings out of a platform API payload.
///
/// Tolerant by design: boards differ in envelope (`jobs`, `content`,
/// top-level array) and field names, so this walks the known shapes
/// instead of deserializing a schema per platform.
fn postings_from_json(value: &Value, base_url: &Url) -> Vec<JobLink> {
    let items: &[Value] = match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            let envelope = ["jobs", "content", "postings", "offers", "data"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array));
            match envelope {
                Some(items) => items,
                None => return Vec::new(),
            }
        }
        _ => return Vec::new(),
    };

    let mut links: Vec<JobLink> = Vec::new();

    for item in items {
        let Some(obj) = item.as_object() else {
            continue;
        };

        let title = ["title", "text", "name"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let Some(title) = title else {
            continue;
        };

        let url = ["absolute_url", "hostedUrl", "applyUrl", "url", "careers_url"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .and_then(|u| base_url.join(u).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| base_url.to_string());

        if links.iter().any(|l| l.url == url) {
            continue;
        }

        let mut link = JobLink::new(url, title, LinkType::JobPosting, API_CONFIDENCE);

        link.location = obj
            .get("location")
            .and_then(|l| l.as_str().map(String::from).or_else(|| location_name(l)))
            .or_else(|| obj.get("categories").and_then(|c| c.get("location")).and_then(Value::as_str).map(String::from));

        link.department = obj
            .get("departments")
            .and_then(Value::as_array)
            .and_then(|d| d.first())
            .and_then(|d| d.get("name"))
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| {
                obj.get("categories")
                    .and_then(|c| c.get("team"))
                    .and_then(Value::as_str)
                    .map(String::from)
            });

        links.push(link);
    }

    links
}

fn location_name(location: &Value) -> Option<String> {
    location.get("name").and_then(Value::as_str).map(String::from)
}
