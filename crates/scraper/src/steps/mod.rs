//! Extraction step contract and registry.
//!
//! Every extraction strategy implements [`ExtractionStep`]; the registry
//! orders them by ascending priority and the orchestrator walks that
//! order, taking the first validated result. Steps are self-describing:
//! applicability is a cheap synchronous judgment, extraction is the
//! expensive async one.

pub mod frames;
pub mod platform;
pub mod static_html;

#[cfg(feature = "render")]
pub mod headless;

use crate::extract;
use joblens_core::{Dictionary, Error, ExtractionResult, PipelineContext, ScrapeOptions};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

pub use frames::IframeStep;
pub use platform::PlatformStep;
pub use static_html::StaticHtmlStep;

#[cfg(feature = "render")]
pub use headless::HeadlessStep;

/// Priority bands. Lower runs earlier; platform steps add their
/// dictionary declaration index to keep registration order stable.
pub const PRIORITY_STATIC: u32 = 10;
pub const PRIORITY_PLATFORM_BASE: u32 = 20;
pub const PRIORITY_HEADLESS: u32 = 50;
pub const PRIORITY_IFRAME: u32 = 60;

/// One extraction strategy in the pipeline.
#[async_trait]
pub trait ExtractionStep: Send + Sync {
    /// Stable method name, recorded on results this step produces.
    fn name(&self) -> &str;

    /// Ordering key; lower priorities run first.
    fn priority(&self) -> u32;

    /// Cheap gate: can this step plausibly handle the URL in the current
    /// pipeline state? No network or DOM work here.
    fn is_applicable(&self, url: &Url, ctx: &PipelineContext) -> bool;

    /// Attempt extraction. `Ok(None)` means a clean miss: the step ran
    /// but found nothing worth validating.
    ///
    /// # Errors
    ///
    /// Transport, render, and policy failures. The orchestrator treats
    /// an error like a miss and moves on to the next step.
    async fn scrape(
        &self, url: &Url, opts: &ScrapeOptions, ctx: &PipelineContext,
    ) -> Result<Option<ExtractionResult>, Error>;
}

/// Priority-ordered step collection.
pub struct StepRegistry {
    steps: Vec<Arc<dyn ExtractionStep>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Insert a step, keeping ascending priority order. Registration
    /// order breaks ties.
    pub fn register(&mut self, step: Arc<dyn ExtractionStep>) {
        let pos = self
            .steps
            .iter()
            .position(|s| s.priority() > step.priority())
            .unwrap_or(self.steps.len());
        self.steps.insert(pos, step);
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[Arc<dyn ExtractionStep>] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an extraction result from a fetched or rendered document.
///
/// Shared by every DOM-based step: flatten the text, harvest and
/// classify anchors, merge JSON-LD postings in, and pick up the title.
/// Returns `None` when the document yields neither text nor links.
pub(crate) fn build_result(
    url: &Url, html: &str, dictionary: &Dictionary, opts: &ScrapeOptions,
) -> Option<ExtractionResult> {
    let text = extract::flatten_text(html);
    let raw = extract::harvest_links(html, url);
    let mut links = extract::classify_links(&raw, dictionary, opts.search_contact_pages);

    for posting in extract::harvest_jsonld_postings(html, url) {
        if !links.iter().any(|l| l.url == posting.url) {
            links.push(posting);
        }
    }

    if text.trim().is_empty() && links.is_empty() {
        return None;
    }

    let mut result = ExtractionResult::new(url.as_str(), text, links);
    result.title = extract::extract_title(html);
    Some(result)
}
