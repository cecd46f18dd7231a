//! Headless extraction step.
//!
//! Catch-all for JS-rendered pages that static parsing and platform
//! handling both missed. Renders with the shared browser, runs content
//! expansion on the live page, and parses the settled DOM.

use crate::expand::{ExpansionConfig, ExpansionEngine};
use crate::render::{BrowserHandle, RenderOptions};
use crate::steps::{ExtractionStep, PRIORITY_HEADLESS, build_result};
use joblens_core::{Dictionary, Error, ExtractionResult, PipelineContext, ScrapeOptions};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

pub struct HeadlessStep {
    browser: Arc<BrowserHandle>,
    dictionary: Arc<Dictionary>,
}

impl HeadlessStep {
    pub fn new(browser: Arc<BrowserHandle>, dictionary: Arc<Dictionary>) -> Self {
        Self { browser, dictionary }
    }
}

#[async_trait]
impl ExtractionStep for HeadlessStep {
    fn name(&self) -> &str {
        "headless"
    }

    fn priority(&self) -> u32 {
        PRIORITY_HEADLESS
    }

    fn is_applicable(&self, url: &Url, _ctx: &PipelineContext) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    async fn scrape(
        &self, url: &Url, opts: &ScrapeOptions, _ctx: &PipelineContext,
    ) -> Result<Option<ExtractionResult>, Error> {
        if !opts.use_headless_fallback {
            tracing::debug!("headless fallback disabled for this call");
            return Ok(None);
        }

        let engine = ExpansionEngine::new(self.dictionary.clone(), ExpansionConfig::default());
        let render_opts = RenderOptions { timeout_ms: opts.timeout_ms, ..Default::default() };
        let page = self.browser.render_expanded(url, &render_opts, &engine).await?;

        if let Some(report) = &page.expansion {
            tracing::debug!(
                clicks = report.clicks,
                pages = report.pages_followed,
                "headless expansion finished for {url}"
            );
        }

        Ok(build_result(&page.final_url, &page.html, &self.dictionary, opts))
    }
}
