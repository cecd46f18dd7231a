//! Iframe extraction step.
//!
//! Last resort for career pages that embed their listings in a
//! third-party iframe. Each frame document is fetched (or rendered) and
//! parsed on its own, then merged with whatever the main document
//! yielded. Runs late because frame traversal multiplies network work.

use crate::extract::find_iframe_sources;
use crate::fetch::FetchClient;
use crate::steps::{ExtractionStep, PRIORITY_IFRAME, build_result};
use joblens_core::{Dictionary, Error, ExtractionResult, PipelineContext, ScrapeOptions};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

#[cfg(feature = "render")]
use crate::render::{BrowserHandle, RenderOptions};

/// Frames processed per page. Career embeds are virtually always the
/// first frame; the rest are trackers and chat widgets.
const MAX_FRAMES: usize = 3;

pub struct IframeStep {
    fetch: Arc<FetchClient>,
    dictionary: Arc<Dictionary>,
    #[cfg(feature = "render")]
    browser: Option<Arc<BrowserHandle>>,
}

impl IframeStep {
    pub fn new(fetch: Arc<FetchClient>, dictionary: Arc<Dictionary>) -> Self {
        Self {
            fetch,
            dictionary,
            #[cfg(feature = "render")]
            browser: None,
        }
    }

    /// Attach the shared browser for rendering JS-only frames.
    #[cfg(feature = "render")]
    pub fn with_browser(mut self, browser: Arc<BrowserHandle>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Pull one frame document: plain fetch first, render fallback when
    /// the fetch came back without extractable content.
    async fn frame_result(
        &self, frame_url: &Url, opts: &ScrapeOptions,
    ) -> Option<ExtractionResult> {
        let fetched = match self.fetch.fetch(frame_url.as_str()).await {
            Ok(r) if r.is_html() => build_result(frame_url, &r.text(), &self.dictionary, opts),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("frame fetch {frame_url} failed: {e}");
                None
            }
        };

        if let Some(result) = &fetched
            && !result.links.is_empty()
        {
            return fetched;
        }

        // Text-only fetch result survives as the fallback when the frame
        // cannot be rendered either.
        self.render_frame(frame_url, opts).await.or(fetched)
    }

    #[cfg(feature = "render")]
    async fn render_frame(&self, frame_url: &Url, opts: &ScrapeOptions) -> Option<ExtractionResult> {
        let browser = self.browser.as_ref()?;
        if !opts.use_headless_fallback {
            return None;
        }

        let render_opts = RenderOptions { timeout_ms: opts.timeout_ms, ..Default::default() };
        match browser.render(frame_url, &render_opts).await {
            Ok(page) => build_result(&page.final_url, &page.html, &self.dictionary, opts),
            Err(e) => {
                tracing::debug!("frame render {frame_url} failed: {e}");
                None
            }
        }
    }

    #[cfg(not(feature = "render"))]
    async fn render_frame(&self, _frame_url: &Url, _opts: &ScrapeOptions) -> Option<ExtractionResult> {
        None
    }
}

#[async_trait]
impl ExtractionStep for IframeStep {
    fn name(&self) -> &str {
        "iframe"
    }

    fn priority(&self) -> u32 {
        PRIORITY_IFRAME
    }

    /// Fires when the accumulated HTML embeds an iframe, or when a prior
    /// step's text mentions one (the embed can be visible as prose even
    /// when the seed fetch yielded no markup). Never recurses into
    /// frames-of-frames.
    fn is_applicable(&self, _url: &Url, ctx: &PipelineContext) -> bool {
        if ctx.is_iframe_content {
            return false;
        }
        if ctx
            .html_content
            .as_deref()
            .is_some_and(|html| html.contains("<iframe"))
        {
            return true;
        }
        ctx.previous_step_result
            .as_ref()
            .is_some_and(|prior| prior.text.to_lowercase().contains("iframe"))
    }

    async fn scrape(
        &self, url: &Url, opts: &ScrapeOptions, ctx: &PipelineContext,
    ) -> Result<Option<ExtractionResult>, Error> {
        // When applicability fired off prior-step text alone, fetch the
        // page once to have markup to enumerate frames from.
        let html = match ctx.html_content.as_deref() {
            Some(html) => html.to_string(),
            None => match self.fetch.fetch(url.as_str()).await {
                Ok(r) if r.is_html() => r.text(),
                Ok(_) => return Ok(None),
                Err(e) => {
                    tracing::debug!("page fetch for frame scan failed: {e}");
                    return Ok(None);
                }
            },
        };

        let sources = find_iframe_sources(&html, url);
        if sources.is_empty() {
            return Ok(None);
        }

        // Main-document content the earlier steps accumulated, used as
        // the merge base so frame links extend rather than replace it.
        let mut merged = ctx
            .previous_step_result
            .clone()
            .or_else(|| build_result(url, &html, &self.dictionary, opts));
        let mut frame_hits = 0usize;

        for source in sources.iter().take(MAX_FRAMES) {
            let Ok(frame_url) = Url::parse(source) else {
                continue;
            };

            if let Some(frame_result) = self.frame_result(&frame_url, opts).await {
                frame_hits += 1;
                merged = Some(match merged {
                    Some(base) => base.merge(&frame_result),
                    None => frame_result,
                });
            }
        }

        if frame_hits == 0 {
            return Ok(None);
        }

        let mut merged = match merged {
            Some(m) => m,
            None => return Ok(None),
        };
        // The merged result belongs to the page, not to a frame.
        merged.url = url.to_string();
        Ok(Some(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchConfig;

    fn step() -> IframeStep {
        let fetch = Arc::new(FetchClient::new(FetchConfig::default()).unwrap());
        IframeStep::new(fetch, Arc::new(Dictionary::english()))
    }

    #[test]
    fn test_applicable_only_with_iframes() {
        let step = step();
        let url = Url::parse("https://acme.example/careers").unwrap();

        let ctx = PipelineContext::default();
        assert!(!step.is_applicable(&url, &ctx));

        let ctx = PipelineContext {
            html_content: Some("<html><body><p>plain</p></body></html>".to_string()),
            ..Default::default()
        };
        assert!(!step.is_applicable(&url, &ctx));

        let ctx = PipelineContext {
            html_content: Some(r#"<iframe src="https://jobs.example/embed"></iframe>"#.to_string()),
            ..Default::default()
        };
        assert!(step.is_applicable(&url, &ctx));
    }

    #[test]
    fn test_prior_step_text_mentioning_iframe_triggers_step() {
        // Seed fetch failed, but an earlier step's rejected result read the
        // embed notice off the page.
        let step = step();
        let url = Url::parse("https://acme.example/careers").unwrap();
        let prior = ExtractionResult::new(
            url.as_str(),
            "Our job listings are loaded in an iframe from our hiring platform.",
            Vec::new(),
        );
        let ctx = PipelineContext { previous_step_result: Some(prior), ..Default::default() };

        assert!(step.is_applicable(&url, &ctx));
    }

    #[test]
    fn test_never_recurses_into_frames() {
        let step = step();
        let url = Url::parse("https://acme.example/careers").unwrap();
        let ctx = PipelineContext {
            html_content: Some(r#"<iframe src="https://jobs.example/embed"></iframe>"#.to_string()),
            is_iframe_content: true,
            ..Default::default()
        };

        assert!(!step.is_applicable(&url, &ctx));
    }

    #[tokio::test]
    async fn test_no_sources_is_clean_miss() {
        let step = step();
        let url = Url::parse("https://acme.example/careers").unwrap();
        // `<iframe` appears but carries no usable src.
        let ctx = PipelineContext {
            html_content: Some("<iframe></iframe>".to_string()),
            ..Default::default()
        };

        let result = step.scrape(&url, &ScrapeOptions::default(), &ctx).await.unwrap();
        assert!(result.is_none());
    }
}
