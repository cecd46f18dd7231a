//! Static-HTML extraction step.
//!
//! Cheapest strategy and always applicable: fetch the document (or reuse
//! HTML an earlier stage already pulled), flatten it, and harvest links
//! and JSON-LD postings. Covers server-rendered career pages without
//! touching a browser.

use crate::fetch::FetchClient;
use crate::steps::{ExtractionStep, PRIORITY_STATIC, build_result};
use joblens_core::{Dictionary, Error, ExtractionResult, PipelineContext, ScrapeOptions};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

pub struct StaticHtmlStep {
    fetch: Arc<FetchClient>,
    dictionary: Arc<Dictionary>,
}

impl StaticHtmlStep {
    pub fn new(fetch: Arc<FetchClient>, dictionary: Arc<Dictionary>) -> Self {
        Self { fetch, dictionary }
    }
}

#[async_trait]
impl ExtractionStep for StaticHtmlStep {
    fn name(&self) -> &str {
        "static_html"
    }

    fn priority(&self) -> u32 {
        PRIORITY_STATIC
    }

    fn is_applicable(&self, url: &Url, _ctx: &PipelineContext) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    async fn scrape(
        &self, url: &Url, opts: &ScrapeOptions, ctx: &PipelineContext,
    ) -> Result<Option<ExtractionResult>, Error> {
        let html = match &ctx.html_content {
            Some(html) => html.clone(),
            None => {
                let response = self.fetch.fetch(url.as_str()).await?;
                if !response.is_html() {
                    tracing::debug!("non-HTML content type for {url}, skipping static step");
                    return Ok(None);
                }
                response.text()
            }
        };

        Ok(build_result(url, &html, &self.dictionary, opts))
    }
}
