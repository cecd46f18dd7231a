//! Shared data model for the extraction pipeline.
//!
//! Results and links are created fresh per scrape call; merges build new
//! values instead of mutating inputs so independent URLs can be scraped
//! concurrently without shared state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category of a harvested job link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// Direct link to a single posting.
    JobPosting,
    /// Link to a listing/overview page.
    JobListing,
    /// Link to a careers portal or contact page.
    CareerPortal,
}

/// How a candidate title matched the caller's search terms.
///
/// Ordering reflects match strength: `Exact` is the strongest tier,
/// `Isolated` the weakest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Isolated,
    Partial,
    Contextual,
    Proximity,
    Exact,
}

/// A candidate job link discovered during extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLink {
    /// Absolute URL of the candidate posting.
    pub url: String,

    /// Link text, treated as the candidate job title.
    pub text: String,

    /// Whether the link points at an individual posting (vs. a listing).
    pub is_job_posting: bool,

    /// Link category.
    pub link_type: LinkType,

    /// Confidence in [0, 1] that this is a genuine, relevant posting.
    pub confidence: f64,

    /// Location extracted alongside the title, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Department or team, if the page exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    /// Match tier assigned by the relevance scorer, if scoring ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
}

impl JobLink {
    /// Build a link with a clamped confidence and no scoring metadata.
    pub fn new(url: impl Into<String>, text: impl Into<String>, link_type: LinkType, confidence: f64) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            is_job_posting: link_type == LinkType::JobPosting,
            link_type,
            confidence: confidence.clamp(0.0, 1.0),
            location: None,
            department: None,
            match_type: None,
        }
    }
}

/// One fully-formed extraction outcome for a single URL.
///
/// A step returns either a complete result or nothing; a result with zero
/// links still carries `text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// URL the result was extracted from.
    pub url: String,

    /// Page title, if one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Flattened, whitespace-normalized page text.
    pub text: String,

    /// Harvested links in discovery order.
    pub links: Vec<JobLink>,

    /// When the extraction happened.
    pub scraped_at: DateTime<Utc>,

    /// Platform signature name, when detection succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_platform: Option<String>,

    /// Name of the step/method that produced the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ExtractionResult {
    /// Build a result for `url` with the current timestamp.
    pub fn new(url: impl Into<String>, text: impl Into<String>, links: Vec<JobLink>) -> Self {
        Self {
            url: url.into(),
            title: None,
            text: text.into(),
            links,
            scraped_at: Utc::now(),
            detected_platform: None,
            method: None,
        }
    }

    /// True when the result carries neither text nor links.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.links.is_empty()
    }

    /// Merge two results (e.g. main document + iframe) into a new one.
    ///
    /// Links are de-duplicated by URL, keeping the highest confidence per
    /// duplicate. Discovery order of first appearance is preserved. Text is
    /// concatenated; `self` wins title/platform/method when both are set.
    pub fn merge(&self, other: &ExtractionResult) -> ExtractionResult {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut links: Vec<JobLink> = Vec::with_capacity(self.links.len() + other.links.len());

        for link in self.links.iter().chain(other.links.iter()) {
            match index.get(&link.url) {
                Some(&idx) => {
                    if link.confidence > links[idx].confidence {
                        links[idx] = link.clone();
                    }
                }
                None => {
                    index.insert(link.url.clone(), links.len());
                    links.push(link.clone());
                }
            }
        }

        let text = if other.text.trim().is_empty() {
            self.text.clone()
        } else if self.text.trim().is_empty() {
            other.text.clone()
        } else {
            format!("{}\n{}", self.text, other.text)
        };

        ExtractionResult {
            url: self.url.clone(),
            title: self.title.clone().or_else(|| other.title.clone()),
            text,
            links,
            scraped_at: self.scraped_at,
            detected_platform: self.detected_platform.clone().or_else(|| other.detected_platform.clone()),
            method: self.method.clone().or_else(|| other.method.clone()),
        }
    }
}

/// Per-call scrape options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOptions {
    /// Overall per-step execution ceiling in milliseconds.
    pub timeout_ms: u64,

    /// Bypass the result cache for this call.
    pub force_refresh: bool,

    /// Allow headless rendering fallbacks.
    pub use_headless_fallback: bool,

    /// Also surface detected contact/about pages as career-portal links.
    pub search_contact_pages: bool,

    /// Reject partial/isolated relevance tiers.
    pub strict_mode: bool,

    /// BCP 47 language tag used for Accept-Language and cache keying.
    pub language: String,

    /// Target job titles for relevance scoring; empty means no filter.
    pub search_terms: Vec<String>,

    /// Target locations; add a fixed bonus, never gate acceptance.
    pub search_locations: Vec<String>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            force_refresh: false,
            use_headless_fallback: true,
            search_contact_pages: false,
            strict_mode: false,
            language: "en".to_string(),
            search_terms: Vec::new(),
            search_locations: Vec::new(),
        }
    }
}

/// Mutable per-call context threaded through the step pipeline.
///
/// Owned exclusively by the orchestrator; steps receive a view for the
/// duration of one call and never retain it.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    /// Best platform guess from the one-shot detection pass.
    pub detected_platform: Option<String>,

    /// HTML accumulated from the seed fetch or an earlier step.
    pub html_content: Option<String>,

    /// Outcome of the most recent step attempt, success or not.
    pub previous_step_result: Option<ExtractionResult>,

    /// Set when the document being processed came out of an iframe.
    pub is_iframe_content: bool,
}

/// Failure record for one URL in a batch scrape.
///
/// Batch invocations never throw for a single URL; failures are
/// materialized so sibling URLs keep going.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeFailure {
    pub url: String,
    pub error: String,
    pub scraped_at: DateTime<Utc>,
}

/// Outcome of one URL within a batch.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// Validated result.
    Extracted(ExtractionResult),
    /// All applicable steps exhausted without a validated result.
    NoResult { url: String },
    /// The pipeline itself failed (bad URL, cache fault).
    Failed(ScrapeFailure),
}
